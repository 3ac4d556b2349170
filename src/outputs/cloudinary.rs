//! Unsigned uploads to Cloudinary.
//!
//! The social API only accepts public image URLs, so every rendered slide is
//! pushed to the media host first. Uploads use an unsigned upload preset; no
//! API secret is needed on this side.

use crate::models::ComposedSlide;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::error::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    #[serde(default)]
    error: Option<UploadError>,
}

#[derive(Debug, Deserialize)]
struct UploadError {
    message: String,
}

/// Pull `secure_url` out of an upload response body.
pub fn parse_secure_url(body: &str) -> Result<String, Box<dyn Error>> {
    let resp: UploadResponse = serde_json::from_str(body)?;
    if let Some(err) = resp.error {
        return Err(format!("Cloudinary rejected upload: {}", err.message).into());
    }
    resp.secure_url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| "Cloudinary response has no secure_url".into())
}

#[derive(Debug, Clone)]
pub struct CloudinaryUploader {
    client: Client,
    cloud_name: String,
    upload_preset: String,
}

impl CloudinaryUploader {
    pub fn new(
        client: Client,
        cloud_name: impl Into<String>,
        upload_preset: impl Into<String>,
    ) -> Self {
        Self {
            client,
            cloud_name: cloud_name.into(),
            upload_preset: upload_preset.into(),
        }
    }

    pub fn upload_url(&self) -> String {
        format!("{API_BASE}/{}/image/upload", self.cloud_name)
    }

    /// Upload one JPEG and return its public HTTPS URL.
    #[instrument(level = "info", skip(self, bytes), fields(bytes = bytes.len()))]
    pub async fn upload_image(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<String, Box<dyn Error>> {
        let part = Part::bytes(bytes).file_name(file_name.to_string()).mime_str("image/jpeg")?;
        let form = Form::new()
            .text("upload_preset", self.upload_preset.clone())
            .part("file", part);

        let resp = self.client.post(self.upload_url()).multipart(form).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(format!("Cloudinary returned {status}: {body}").into());
        }
        let url = parse_secure_url(&body)?;
        info!(%url, "Uploaded slide");
        Ok(url)
    }

    /// Upload composed slides one after another, keeping slide order.
    ///
    /// Slides that fail to read or upload are logged and left out.
    #[instrument(level = "info", skip_all, fields(slides = slides.len()))]
    pub async fn upload_all(&self, slides: &[ComposedSlide]) -> Vec<String> {
        let urls: Vec<String> = stream::iter(slides)
            .then(|slide| async move {
                let file_name = slide
                    .output_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "slide.jpg".to_string());
                debug!(
                    heading = %slide.heading,
                    keyword = %slide.image_search_keyword,
                    "Uploading slide"
                );
                let bytes = match fs::read(&slide.output_path).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        error!(
                            path = %slide.output_path.display(),
                            error = %e,
                            "Could not read rendered slide"
                        );
                        return None;
                    }
                };
                match self.upload_image(bytes, &file_name).await {
                    Ok(url) => Some(url),
                    Err(e) => {
                        error!(path = %slide.output_path.display(), error = %e, "Upload failed");
                        None
                    }
                }
            })
            .filter_map(std::future::ready)
            .collect()
            .await;

        info!(uploaded = urls.len(), "Uploads finished");
        urls
    }
}
