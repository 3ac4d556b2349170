//! Ledger of already published stories.
//!
//! A pretty-printed JSON array of `{title, url, image_url}` records. A story is
//! considered published if either its title or its URL appears in the ledger,
//! so a re-titled reprint of the same link is still caught.

use crate::models::{BestArticle, SelectedArticle};
use std::collections::HashSet;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};

#[derive(Debug)]
pub struct PublishedLedger {
    path: PathBuf,
    entries: Vec<SelectedArticle>,
    titles: HashSet<String>,
    urls: HashSet<String>,
}

impl PublishedLedger {
    /// Read the ledger at `path`; a missing file is an empty ledger.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let path = path.as_ref().to_path_buf();
        let entries: Vec<SelectedArticle> = match fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => Vec::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No ledger yet");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };
        info!(count = entries.len(), "Loaded published ledger");

        let titles = entries.iter().map(|a| a.title.clone()).collect();
        let urls = entries.iter().map(|a| a.url.clone()).collect();
        Ok(Self {
            path,
            entries,
            titles,
            urls,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_published(&self, title: &str, url: &str) -> bool {
        self.titles.contains(title) || self.urls.contains(url)
    }

    /// Keep only shortlist entries that have not been published yet.
    pub fn unpublished(&self, articles: Vec<BestArticle>) -> Vec<BestArticle> {
        articles
            .into_iter()
            .filter(|a| !self.is_published(&a.title, &a.url))
            .collect()
    }

    /// Record `article` and rewrite the ledger file.
    #[instrument(level = "info", skip_all, fields(title = %article.title))]
    pub async fn append(&mut self, article: SelectedArticle) -> Result<(), Box<dyn Error>> {
        self.titles.insert(article.title.clone());
        self.urls.insert(article.url.clone());
        self.entries.push(article);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, json).await?;
        info!(count = self.entries.len(), path = %self.path.display(), "Ledger updated");
        Ok(())
    }
}
