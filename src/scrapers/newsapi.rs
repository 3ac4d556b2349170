//! NewsAPI `everything` index.
//!
//! One request per run: the configured query over the last few days, sorted
//! by popularity. Articles missing a title or a link are dropped here so the
//! later stages never see them.

use crate::config::PipelineConfig;
use crate::models::{NewsArticle, NewsResponse};
use chrono::{Duration, NaiveDate, Utc};
use reqwest::Client;
use std::error::Error;
use tracing::{error, info, instrument, warn};
use url::Url;

const EVERYTHING_URL: &str = "https://newsapi.org/v2/everything";

/// Request URL for `query` between `from` and `to`.
pub fn everything_url(
    query: &str,
    from: NaiveDate,
    to: NaiveDate,
    api_key: &str,
) -> Result<Url, url::ParseError> {
    Url::parse_with_params(
        EVERYTHING_URL,
        &[
            ("q", query.to_string()),
            ("from", from.to_string()),
            ("to", to.to_string()),
            ("sortBy", "popularity".to_string()),
            ("apiKey", api_key.to_string()),
        ],
    )
}

/// Parse a response body, keeping only usable articles.
pub fn parse_articles(body: &str) -> Result<Vec<NewsArticle>, serde_json::Error> {
    let response: NewsResponse = serde_json::from_str(body)?;
    if response.status != "ok" {
        warn!(status = %response.status, "NewsAPI reported a non-ok status");
    }
    Ok(response.articles.into_iter().filter(NewsArticle::is_usable).collect())
}

/// Fetch the popularity-sorted news index for the configured query.
///
/// Transport errors and non-success statuses are logged and yield an empty list.
#[instrument(
    level = "info",
    skip_all,
    fields(query = %config.news_query, days = config.lookback_days)
)]
pub async fn fetch_news(client: &Client, config: &PipelineConfig) -> Vec<NewsArticle> {
    match try_fetch_news(client, config).await {
        Ok(articles) => {
            info!(count = articles.len(), "Fetched news index");
            articles
        }
        Err(e) => {
            error!(error = %e, "News fetch failed");
            Vec::new()
        }
    }
}

async fn try_fetch_news(
    client: &Client,
    config: &PipelineConfig,
) -> Result<Vec<NewsArticle>, Box<dyn Error>> {
    let api_key = config
        .credentials
        .news_api_key
        .as_deref()
        .ok_or("NEWS_API_KEY is not set")?;
    let to = Utc::now().date_naive();
    let from = to - Duration::days(config.lookback_days.max(0));
    let url = everything_url(&config.news_query, from, to, api_key)?;

    let resp = client.get(url).send().await?;
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(format!("NewsAPI returned {status}").into());
    }
    Ok(parse_articles(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_everything_url_carries_all_parameters() {
        let from = NaiveDate::from_ymd_opt(2025, 5, 4).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 5, 6).unwrap();
        let url = everything_url("ai chips", from, to, "k3y").unwrap();

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        assert!(pairs.contains(&("q".into(), "ai chips".into())));
        assert!(pairs.contains(&("from".into(), "2025-05-04".into())));
        assert!(pairs.contains(&("to".into(), "2025-05-06".into())));
        assert!(pairs.contains(&("sortBy".into(), "popularity".into())));
        assert!(pairs.contains(&("apiKey".into(), "k3y".into())));
    }

    #[test]
    fn test_parse_articles_drops_unusable_entries() {
        let body = r#"{
            "status": "ok",
            "totalResults": 3,
            "articles": [
                {"source": {"id": null, "name": "Wire"}, "title": "Chip war heats up",
                 "url": "https://news/1", "urlToImage": "https://img/1",
                 "publishedAt": "2025-05-05T10:00:00Z"},
                {"source": {"id": null, "name": "Wire"}, "title": null, "url": "https://news/2"},
                {"title": "No link", "url": ""}
            ]
        }"#;

        let articles = parse_articles(body).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url_to_image.as_deref(), Some("https://img/1"));
        assert_eq!(articles[0].source.name.as_deref(), Some("Wire"));
    }

    #[test]
    fn test_parse_articles_rejects_garbage() {
        assert!(parse_articles("<html>").is_err());
    }
}
