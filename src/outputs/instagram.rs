//! Carousel publishing through the Instagram Graph API.
//!
//! Three steps against `graph.facebook.com/v22.0/{ig-user-id}`:
//!
//! 1. `POST /media` with `is_carousel_item=true` for every image URL
//! 2. `POST /media` with `media_type=CAROUSEL`, the caption and the child ids
//! 3. `POST /media_publish` with the carousel container id
//!
//! A failed item in step 1 is recorded and the rest continue; the post is
//! aborted only if no item container was created at all.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::error::Error;
use tracing::{error, info, instrument, warn};

const GRAPH_BASE: &str = "https://graph.facebook.com/v22.0";

/// One Graph API request body.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphBody {
    Form(Vec<(&'static str, String)>),
    Json(serde_json::Value),
}

/// How requests reach the Graph API. Returns the status code and raw body.
pub trait GraphTransport {
    async fn post_graph(&self, url: &str, body: GraphBody) -> Result<(u16, String), Box<dyn Error>>;
}

impl GraphTransport for Client {
    async fn post_graph(
        &self,
        url: &str,
        body: GraphBody,
    ) -> Result<(u16, String), Box<dyn Error>> {
        let req = self.post(url);
        let req = match body {
            GraphBody::Form(fields) => req.form(&fields),
            GraphBody::Json(value) => req.json(&value),
        };
        let resp = req.send().await?;
        let status = resp.status().as_u16();
        Ok((status, resp.text().await?))
    }
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

fn parse_id(status: u16, body: &str) -> Result<String, Box<dyn Error>> {
    if !(200..300).contains(&status) {
        return Err(format!("Graph API returned {status}: {body}").into());
    }
    Ok(serde_json::from_str::<IdResponse>(body)?.id)
}

/// Result of step 1 for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub image_url: String,
    pub result: Result<String, String>,
}

/// Per-item outcomes plus the published post id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub items: Vec<ItemOutcome>,
    pub post_id: String,
}

impl PublishReport {
    pub fn published_items(&self) -> usize {
        self.items.iter().filter(|i| i.result.is_ok()).count()
    }
}

#[derive(Debug)]
pub struct InstagramPublisher<T> {
    transport: T,
    user_id: String,
    access_token: String,
}

impl<T: GraphTransport> InstagramPublisher<T> {
    pub fn new(transport: T, user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            transport,
            user_id: user_id.into(),
            access_token: access_token.into(),
        }
    }

    fn endpoint(&self, edge: &str) -> String {
        format!("{GRAPH_BASE}/{}/{edge}", self.user_id)
    }

    async fn create_item(&self, image_url: &str) -> Result<String, Box<dyn Error>> {
        let body = GraphBody::Form(vec![
            ("image_url", image_url.to_string()),
            ("is_carousel_item", "true".to_string()),
            ("access_token", self.access_token.clone()),
        ]);
        let (status, text) = self.transport.post_graph(&self.endpoint("media"), body).await?;
        parse_id(status, &text)
    }

    /// Publish `image_urls` as one carousel post with `caption`.
    ///
    /// # Errors
    ///
    /// No item container could be created, or the carousel container or the
    /// publish call failed.
    #[instrument(level = "info", skip_all, fields(images = image_urls.len()))]
    pub async fn publish_carousel(
        &self,
        caption: &str,
        image_urls: &[String],
    ) -> Result<PublishReport, Box<dyn Error>> {
        let mut items = Vec::with_capacity(image_urls.len());
        for url in image_urls {
            let result = match self.create_item(url).await {
                Ok(id) => {
                    info!(container_id = %id, "Item container created");
                    Ok(id)
                }
                Err(e) => {
                    warn!(%url, error = %e, "Item container failed");
                    Err(e.to_string())
                }
            };
            items.push(ItemOutcome {
                image_url: url.clone(),
                result,
            });
        }

        let children: Vec<&str> = items.iter().filter_map(|i| i.result.as_deref().ok()).collect();
        if children.is_empty() {
            error!("No item containers created; aborting post");
            return Err("no carousel item containers were created".into());
        }

        let body = GraphBody::Json(json!({
            "media_type": "CAROUSEL",
            "children": children,
            "caption": caption,
            "access_token": self.access_token,
        }));
        let (status, text) = self.transport.post_graph(&self.endpoint("media"), body).await?;
        let creation_id =
            parse_id(status, &text).map_err(|e| format!("carousel container failed: {e}"))?;
        info!(%creation_id, children = children.len(), "Carousel container created");

        let body = GraphBody::Form(vec![
            ("creation_id", creation_id),
            ("access_token", self.access_token.clone()),
        ]);
        let (status, text) = self
            .transport
            .post_graph(&self.endpoint("media_publish"), body)
            .await?;
        let post_id = parse_id(status, &text).map_err(|e| format!("publish failed: {e}"))?;
        info!(%post_id, "Carousel published");

        Ok(PublishReport { items, post_id })
    }
}
