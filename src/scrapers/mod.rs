//! Fetchers for the outside world the pipeline reads from.
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | NewsAPI `everything` | [`newsapi`] | JSON API | Popularity-sorted index of recent articles |
//! | Article pages | [`article`] | HTML scraping | All `<p>` text of the chosen story |
//! | Unsplash search | [`unsplash`] | JSON API | Image candidates per slide keyword |
//!
//! All of them share one [`reqwest::Client`] built by [`http_client`] with an
//! explicit request timeout. Failures are logged and turned into empty
//! results; the pipeline decides what an empty result means.

pub mod article;
pub mod newsapi;
pub mod unsplash;

use reqwest::Client;
use std::time::Duration;

/// Shared HTTP client with a per-request timeout.
pub fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("viral_carousel/", env!("CARGO_PKG_VERSION")))
        .build()
}
