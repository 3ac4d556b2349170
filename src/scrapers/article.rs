//! Full text of the selected story.

use reqwest::Client;
use scraper::{Html, Selector};
use std::error::Error;
use tracing::{error, info, instrument, warn};

/// Text of every `<p>` element, joined by single spaces.
pub fn extract_paragraphs(html: &str) -> Result<String, Box<dyn Error>> {
    let document = Html::parse_document(html);
    let paragraph = Selector::parse("p").map_err(|e| e.to_string())?;

    let text = document
        .select(&paragraph)
        .map(|p| p.text().collect::<String>())
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    Ok(text)
}

/// Download `url` and return its paragraph text.
///
/// Non-success statuses and transport errors are logged and give an empty string.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn scrape_article(client: &Client, url: &str) -> String {
    let resp = match client.get(url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            error!(error = %e, "Article fetch failed");
            return String::new();
        }
    };
    if !resp.status().is_success() {
        warn!(status = %resp.status(), "Article fetch returned non-success status");
        return String::new();
    }

    let body = match resp.text().await {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, "Article body could not be read");
            return String::new();
        }
    };
    match extract_paragraphs(&body) {
        Ok(text) => {
            info!(bytes = text.len(), "Parsed article");
            text
        }
        Err(e) => {
            error!(error = %e, "Article parse failed");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_paragraphs_joins_p_text() {
        let html = r#"<html><body>
            <h1>Headline</h1>
            <p>First   paragraph with <a href="/x">a link</a>.</p>
            <div><p>Second
               paragraph.</p></div>
            <p>   </p>
            <span>not a paragraph</span>
        </body></html>"#;

        assert_eq!(
            extract_paragraphs(html).unwrap(),
            "First paragraph with a link. Second paragraph."
        );
    }

    #[test]
    fn test_extract_paragraphs_without_p_is_empty() {
        assert_eq!(extract_paragraphs("<div>nothing</div>").unwrap(), "");
    }
}
