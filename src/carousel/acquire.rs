//! Image download, fingerprinting and staging.
//!
//! [`ImageAcquirer`] pulls bytes from an [`ImageSource`], fingerprints them
//! (which doubles as the decode check) and writes them to the staging
//! directory under a slug of the slide keyword. Keyword collisions get a
//! numeric suffix instead of overwriting an earlier slide's file.
//!
//! There is no retry: one failed attempt is reported to the caller, which
//! decides whether the slide is skipped.

use crate::carousel::fingerprint::{self, Fingerprint};
use crate::error::{CarouselError, CarouselResult};
use crate::utils::{slugify_keyword, unique_path};
use reqwest::Client;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info, instrument};

/// Where image bytes come from. The HTTP implementation is [`HttpImageSource`].
pub trait ImageSource {
    /// Fetch the raw bytes behind `url`.
    async fn fetch(&self, url: &str) -> CarouselResult<Vec<u8>>;
}

/// Downloads images over HTTP.
///
/// The request timeout is whatever the shared client was built with; see
/// [`crate::scrapers::http_client`].
#[derive(Debug, Clone)]
pub struct HttpImageSource {
    client: Client,
}

impl HttpImageSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl ImageSource for HttpImageSource {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> CarouselResult<Vec<u8>> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CarouselError::network(format!("GET {url} returned {status}")));
        }
        let bytes = resp.bytes().await?;
        debug!(bytes = bytes.len(), "Downloaded image");
        Ok(bytes.to_vec())
    }
}

/// A downloaded, decodable image sitting in the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredImage {
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
}

/// Downloads candidates into a staging directory.
#[derive(Debug)]
pub struct ImageAcquirer<S> {
    source: S,
    staging_dir: PathBuf,
}

impl<S: ImageSource> ImageAcquirer<S> {
    pub fn new(source: S, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            staging_dir: staging_dir.into(),
        }
    }

    #[cfg(test)]
    pub(crate) fn source(&self) -> &S {
        &self.source
    }

    /// Download `url`, fingerprint it and stage it under a slug of `keyword`.
    ///
    /// # Errors
    ///
    /// - [`CarouselError::Network`] on transport failure or non-success status
    /// - [`CarouselError::Decode`] if the bytes are not an image; nothing is written
    /// - [`CarouselError::Io`] if the staging file cannot be written
    #[instrument(level = "info", skip(self), fields(staging = %self.staging_dir.display()))]
    pub async fn acquire(&self, url: &str, keyword: &str) -> CarouselResult<AcquiredImage> {
        let bytes = self.source.fetch(url).await?;
        let fingerprint = fingerprint::fingerprint(&bytes)?;

        let ext = image::guess_format(&bytes)
            .ok()
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("jpg");

        fs::create_dir_all(&self.staging_dir).await?;
        let path = unique_path(&self.staging_dir, &slugify_keyword(keyword), ext).await?;
        fs::write(&path, &bytes).await?;

        info!(path = %path.display(), %fingerprint, "Image staged");
        Ok(AcquiredImage { path, fingerprint })
    }

    /// Remove a staged download that will not be used.
    pub async fn discard(&self, image: &AcquiredImage) {
        if let Err(e) = fs::remove_file(&image.path).await {
            debug!(path = %image.path.display(), error = %e, "Could not remove discarded image");
        }
    }
}
