//! Data-transfer types shared between the pipeline stages.
//!
//! - [`NewsArticle`]: one entry of a NewsAPI `everything` response
//! - [`BestArticle`] / [`SelectedArticle`]: language-model shortlist and final pick
//! - [`Carousel`] / [`SlideSpec`]: generated slide copy plus the long caption
//! - [`CandidateImage`]: one image-search hit for a slide keyword
//! - [`RenderedSlide`] / [`ComposedSlide`]: assembled and composited slides
//!
//! Field names follow the JSON the collaborators speak (NewsAPI camelCase,
//! snake_case in model prompts), so every type is validated simply by
//! deserialising into it.

use crate::carousel::fingerprint::Fingerprint;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level NewsAPI response body.
#[derive(Debug, Default, Deserialize)]
pub struct NewsResponse {
    /// `"ok"` or `"error"`.
    #[serde(default)]
    pub status: String,
    /// Matched articles, most popular first.
    #[serde(default)]
    pub articles: Vec<NewsArticle>,
}

/// The publisher block NewsAPI attaches to every article.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct NewsSource {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// A raw article as returned by NewsAPI.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    #[serde(default)]
    pub source: NewsSource,
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
    /// Truncated body preview (NewsAPI cuts it at ~200 chars).
    pub content: Option<String>,
}

impl NewsArticle {
    /// Articles without a headline or a link are useless to every later stage.
    pub fn is_usable(&self) -> bool {
        let filled = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.trim().is_empty());
        filled(&self.title) && filled(&self.url)
    }
}

/// One entry of the model's viral-potential shortlist.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BestArticle {
    pub title: String,
    pub url: String,
    pub description: String,
    pub image_url: String,
    pub content: String,
    pub published_at: String,
    pub source: String,
    pub why_interesting: String,
}

/// The single story chosen for the carousel. Also the published-ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SelectedArticle {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub image_url: String,
}

/// Copy for one slide, produced by the language model. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SlideSpec {
    pub heading: String,
    /// Short body copy; the model calls it `text`.
    #[serde(rename = "text")]
    pub body_text: String,
    pub image_search_keyword: String,
}

/// Generated carousel: ordered slides plus the long-form post caption.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Carousel {
    pub slides: Vec<SlideSpec>,
    #[serde(default)]
    pub detailed_caption: String,
}

/// One image-search hit for a slide keyword.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct CandidateImage {
    #[serde(rename = "image_url")]
    pub source_url: String,
    #[serde(default)]
    pub alt_text: String,
}

/// The ranker's answer: which candidate URL to use.
#[derive(Debug, Deserialize)]
pub struct SelectedImage {
    pub image_url: String,
}

/// A slide whose image has been downloaded, fingerprinted and accepted as unique.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedSlide {
    pub heading: String,
    #[serde(rename = "text")]
    pub body_text: String,
    pub image_search_keyword: String,
    #[serde(rename = "image_url")]
    pub source_url: String,
    pub fingerprint: Fingerprint,
    #[serde(rename = "downloaded_path")]
    pub image_path: PathBuf,
}

/// A slide with its text overlay burnt in, ready for upload.
#[derive(Debug, Clone)]
pub struct ComposedSlide {
    pub heading: String,
    pub image_search_keyword: String,
    pub output_path: PathBuf,
}
