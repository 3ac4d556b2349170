//! Unsplash photo search as the slide candidate source.
//!
//! The keyword's words are joined with `-` for the query, results are limited
//! to squarish photos, and each hit maps to its `urls.regular` link plus the
//! alt description the ranker gets to read.

use crate::carousel::CandidateSource;
use crate::models::CandidateImage;
use itertools::Itertools;
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;
use tracing::{error, info, instrument};

const SEARCH_URL: &str = "https://api.unsplash.com/search/photos";

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    #[serde(default)]
    urls: PhotoUrls,
    alt_description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PhotoUrls {
    regular: Option<String>,
}

/// Query string value for a slide keyword: words joined by `-`.
pub fn search_query(keyword: &str) -> String {
    keyword.split_whitespace().join("-")
}

/// Map a search response to candidates, dropping hits without a URL and repeated URLs.
pub fn parse_candidates(body: &str) -> Result<Vec<CandidateImage>, serde_json::Error> {
    let response: SearchResponse = serde_json::from_str(body)?;
    Ok(response
        .results
        .into_iter()
        .filter_map(|photo| {
            let url = photo.urls.regular.filter(|u| !u.trim().is_empty())?;
            Some(CandidateImage {
                source_url: url,
                alt_text: photo.alt_description.unwrap_or_default(),
            })
        })
        .unique_by(|c| c.source_url.clone())
        .collect())
}

/// [`CandidateSource`] backed by the Unsplash search API.
#[derive(Debug, Clone)]
pub struct UnsplashSource {
    client: Client,
    access_key: String,
    base_url: String,
}

impl UnsplashSource {
    pub fn new(client: Client, access_key: impl Into<String>) -> Self {
        Self {
            client,
            access_key: access_key.into(),
            base_url: SEARCH_URL.to_string(),
        }
    }

    fn request_url(&self, keyword: &str) -> String {
        format!(
            "{}?page=1&query={}&orientation=squarish&client_id={}",
            self.base_url,
            urlencoding::encode(&search_query(keyword)),
            urlencoding::encode(&self.access_key)
        )
    }

    async fn search(&self, keyword: &str) -> Result<Vec<CandidateImage>, Box<dyn Error>> {
        let resp = self.client.get(self.request_url(keyword)).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("Unsplash returned {status}").into());
        }
        let body = resp.text().await?;
        Ok(parse_candidates(&body)?)
    }
}

impl CandidateSource for UnsplashSource {
    #[instrument(level = "info", skip(self))]
    async fn find_candidates(&self, keyword: &str) -> Vec<CandidateImage> {
        match self.search(keyword).await {
            Ok(candidates) => {
                info!(count = candidates.len(), "Image candidates found");
                candidates
            }
            Err(e) => {
                error!(error = %e, "Image search failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_joins_words_with_dashes() {
        assert_eq!(search_query("  solar   panel farm "), "solar-panel-farm");
        assert_eq!(search_query("robot"), "robot");
    }

    #[test]
    fn test_request_url_shape() {
        let source = UnsplashSource::new(Client::new(), "abc 123");
        let url = source.request_url("data center");
        assert_eq!(
            url,
            "https://api.unsplash.com/search/photos\
             ?page=1&query=data-center&orientation=squarish&client_id=abc%20123"
        );
    }

    #[test]
    fn test_parse_candidates_maps_and_dedups() {
        let body = r#"{
            "total": 4,
            "results": [
                {"urls": {"regular": "https://img/1", "small": "https://img/1s"},
                 "alt_description": "a rocket"},
                {"urls": {"regular": "https://img/1"}, "alt_description": "same rocket"},
                {"urls": {}, "alt_description": "no url"},
                {"urls": {"regular": "https://img/2"}, "alt_description": null}
            ]
        }"#;

        let candidates = parse_candidates(body).unwrap();
        assert_eq!(
            candidates,
            vec![
                CandidateImage {
                    source_url: "https://img/1".into(),
                    alt_text: "a rocket".into(),
                },
                CandidateImage {
                    source_url: "https://img/2".into(),
                    alt_text: String::new(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_candidates_empty_results() {
        assert!(parse_candidates(r#"{"total": 0, "results": []}"#).unwrap().is_empty());
    }
}
