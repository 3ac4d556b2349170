//! The language-model tasks of the pipeline.
//!
//! Four prompts, each answered as JSON and validated into a shared DTO:
//!
//! 1. [`select_interesting_articles`]: viral-potential shortlist of the news index
//! 2. [`review_articles`]: the single best unpublished story, recorded in the ledger
//! 3. [`generate_carousel`]: slide copy, image keywords and the long caption
//! 4. [`LlmRanker`]: picks one image candidate per slide
//!
//! Every function is generic over [`AskAsync`] so the prompts can be exercised
//! against scripted answers.

use crate::api::{AskAsync, ask_json};
use crate::carousel::CandidateRanker;
use crate::carousel::fingerprint::Fingerprint;
use crate::ledger::PublishedLedger;
use crate::models::{
    BestArticle, CandidateImage, Carousel, NewsArticle, SelectedArticle, SelectedImage,
};
use itertools::Itertools;
use std::collections::BTreeSet;
use std::error::Error;
use tracing::{info, instrument, warn};

const SHORTLIST_PROMPT: &str = "You're a social media trend expert. From the following list of \
    articles, select the ones that are most likely to go viral or instantly grab attention on an \
    Instagram page about interesting current news. Only choose articles that are visually \
    appealing, have a strong headline hook, and cover trending or emotionally engaging topics.\n\
    Answer with a JSON array of objects with the keys title, url, description, image_url, \
    content, published_at, source and why_interesting.";

const REVIEW_PROMPT: &str = "You are a content strategist for a tech Instagram page. Review the \
    following articles and select the one that has the highest potential to go viral on \
    Instagram. The ideal post is engaging, informative, and explains a current trending topic in \
    a way that can be split into multiple bite-sized carousel slides. The story must have visual \
    storytelling potential, emotional relatability, and share-worthiness.\n\
    Answer with a single JSON object with the keys title, url and image_url.";

const CAROUSEL_PROMPT: &str = "You are an expert social media storyteller. Create an Instagram \
    carousel post of at least 5 slides from the following article content.\n\n\
    Each slide should have:\n\
    - heading: a clear point, like a tweet-sized fact or insight\n\
    - text: short, engaging copy (max 3 lines)\n\
    - image_search_keyword: a relevant, concrete image search keyword (avoid vague terms)\n\n\
    The flow should follow a story arc: hook, context, development, takeaway, final thought or \
    call to action.\n\
    The post must be understandable without reading the original article.\n\n\
    Then write detailed_caption: a long-form caption telling the full story with good line \
    spacing, emojis and relevant hashtags. Do not put hashtags or emojis in the slides.\n\
    Answer with a single JSON object with the keys slides and detailed_caption.";

/// Ask for the viral-potential shortlist of `articles`.
#[instrument(level = "info", skip_all, fields(articles = articles.len()))]
pub async fn select_interesting_articles<A>(
    api: &A,
    articles: &[NewsArticle],
) -> Result<Vec<BestArticle>, Box<dyn Error>>
where
    A: AskAsync<Response = String>,
{
    let listing = serde_json::to_string(articles)?;
    let prompt = format!("{SHORTLIST_PROMPT}\n\nArticles:\n{listing}");

    let shortlist: Vec<BestArticle> = ask_json(api, &prompt).await?;
    let shortlist: Vec<BestArticle> = shortlist
        .into_iter()
        .filter(|a| !a.title.trim().is_empty() && !a.url.trim().is_empty())
        .unique_by(|a| a.url.clone())
        .collect();

    info!(count = shortlist.len(), "Shortlisted articles");
    Ok(shortlist)
}

/// Pick the single best unpublished story and record it in `ledger`.
///
/// # Errors
///
/// Every shortlisted story is already in the ledger, or the model call failed.
#[instrument(
    level = "info",
    skip_all,
    fields(shortlist = shortlist.len(), published = ledger.len())
)]
pub async fn review_articles<A>(
    api: &A,
    shortlist: Vec<BestArticle>,
    ledger: &mut PublishedLedger,
) -> Result<SelectedArticle, Box<dyn Error>>
where
    A: AskAsync<Response = String>,
{
    let fresh = ledger.unpublished(shortlist);
    if fresh.is_empty() {
        return Err("All articles have already been published".into());
    }

    let listing = serde_json::to_string(&fresh)?;
    let prompt = format!("{REVIEW_PROMPT}\n\nArticles:\n{listing}");
    let selected: SelectedArticle = ask_json(api, &prompt).await?;

    info!(title = %selected.title, url = %selected.url, "Story selected");
    ledger.append(selected.clone()).await?;
    Ok(selected)
}

/// Turn article text into slide copy plus caption.
#[instrument(level = "info", skip_all, fields(content_len = content.len()))]
pub async fn generate_carousel<A>(api: &A, content: &str) -> Result<Carousel, Box<dyn Error>>
where
    A: AskAsync<Response = String>,
{
    let prompt = format!("{CAROUSEL_PROMPT}\n\nArticle Content:\n{content}");
    let carousel: Carousel = ask_json(api, &prompt).await?;

    if carousel.slides.is_empty() {
        warn!("Model produced a carousel without slides");
    }
    info!(
        slides = carousel.slides.len(),
        caption_len = carousel.detailed_caption.len(),
        "Carousel generated"
    );
    Ok(carousel)
}

/// Model-backed [`CandidateRanker`].
///
/// The prompt carries the slide keyword, the fingerprints already in use and
/// the candidate list. An answer naming a URL that was not offered is
/// rejected, as is any failed or malformed answer.
#[derive(Debug)]
pub struct LlmRanker<'a, A> {
    api: &'a A,
}

impl<'a, A> LlmRanker<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }
}

fn ranking_prompt(
    candidates: &[CandidateImage],
    keyword: &str,
    used: &BTreeSet<Fingerprint>,
) -> String {
    let hashes = if used.is_empty() {
        "(none yet)".to_string()
    } else {
        used.iter().join(", ")
    };
    let listing = candidates
        .iter()
        .map(|c| format!("- image_url: {} | alt: {}", c.source_url, c.alt_text))
        .join("\n");
    format!(
        "You are a visual content curator. Select the best image from the list below to match \
        this Instagram slide topic: '{keyword}'.\n\
        Ensure the image is visually unique and not similar to any previously used ones. \
        Perceptual hashes of used images: {hashes}\n\n\
        Image candidates:\n{listing}\n\n\
        Answer with a single JSON object: {{\"image_url\": \"<one of the URLs above>\"}}"
    )
}

impl<'a, A> CandidateRanker for LlmRanker<'a, A>
where
    A: AskAsync<Response = String>,
{
    #[instrument(level = "info", skip_all, fields(%keyword, candidates = candidates.len()))]
    async fn rank_candidate(
        &self,
        candidates: &[CandidateImage],
        keyword: &str,
        used: &BTreeSet<Fingerprint>,
    ) -> Option<CandidateImage> {
        if candidates.is_empty() {
            return None;
        }
        let prompt = ranking_prompt(candidates, keyword, used);

        let pick: SelectedImage = match ask_json(self.api, &prompt).await {
            Ok(pick) => pick,
            Err(e) => {
                warn!(error = %e, "Image ranking failed");
                return None;
            }
        };

        let chosen = candidates.iter().find(|c| c.source_url == pick.image_url.trim()).cloned();
        if chosen.is_none() {
            warn!(answer = %pick.image_url, "Ranker named an image that was not offered");
        }
        chosen
    }
}
