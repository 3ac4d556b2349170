//! # Viral Carousel
//!
//! Turns the day's most shareable tech story into an Instagram carousel:
//! news index, model-picked story, model-written slides, one unique photo per
//! slide, text overlays burnt in, then upload and publish.
//!
//! ## Usage
//!
//! ```sh
//! viral_carousel                          # one run
//! viral_carousel --dry-run --keep-artifacts
//! viral_carousel --interval-minutes 77    # keep posting
//! ```
//!
//! ## Architecture
//!
//! 1. **Index**: NewsAPI `everything`, popularity-sorted
//! 2. **Curate**: shortlist, pick one unpublished story, scrape it, write slides
//! 3. **Assemble**: per slide, search images, rank, download, reject duplicates
//! 4. **Compose**: overlay heading and body on each image
//! 5. **Publish**: upload to the media host, create and publish the carousel

use awful_aj::config::AwfulJadeConfig;
use awful_aj::template::ChatTemplate;
use awful_aj::{config as aj_config, config_dir, template};
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod carousel;
mod cli;
mod config;
mod curator;
mod error;
mod ledger;
mod models;
mod outputs;
mod scrapers;
mod utils;

use api::llm_client;
use carousel::{
    CarouselAssembler, Compositor, FontPair, HttpImageSource, ImageAcquirer, compose_slides,
};
use cli::Cli;
use config::PipelineConfig;
use curator::LlmRanker;
use ledger::PublishedLedger;
use outputs::cloudinary::CloudinaryUploader;
use outputs::instagram::InstagramPublisher;
use scrapers::unsplash::UnsplashSource;
use utils::{ScopedDir, ensure_writable_dir};

/// Long-lived resources shared by every run.
struct Resources {
    llm_config: AwfulJadeConfig,
    llm_template: ChatTemplate,
    fonts: FontPair,
    http: reqwest::Client,
}

/// What one run produced.
#[derive(Debug, Default)]
struct RunSummary {
    requested: usize,
    assembled: usize,
    composed: usize,
    post_id: Option<String>,
}

fn require<'a>(value: &'a Option<String>, var: &str) -> Result<&'a str, Box<dyn Error>> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("{var} is not set").into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!("viral_carousel starting up");

    let args = Cli::parse();
    let cfg = PipelineConfig::from_cli(&args)?;
    debug!(?cfg, "Resolved configuration");

    let resources = load_resources(&cfg).await?;

    match cfg.interval {
        None => {
            run_once(&cfg, &resources).await?;
        }
        Some(every) => {
            info!(minutes = every.as_secs() / 60, "Scheduled mode");
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = run_once(&cfg, &resources).await {
                    error!(error = %e, "Run failed; waiting for next tick");
                }
            }
        }
    }
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn load_resources(cfg: &PipelineConfig) -> Result<Resources, Box<dyn Error>> {
    let conf_file: PathBuf = match &cfg.llm_config_path {
        Some(path) => path.clone(),
        None => config_dir()?.join("config.yaml"),
    };
    let config_path = conf_file.to_str().ok_or("Not a valid config filename")?;
    let llm_config = aj_config::load_config(config_path)?;
    info!(config_path, "Loaded configuration");

    let llm_template = template::load_template(&cfg.llm_template).await?;
    info!(template = %cfg.llm_template, "Loaded template");

    let fonts = FontPair::load(&cfg.render.heading_font, &cfg.render.body_font)?;
    info!(
        heading = %cfg.render.heading_font.display(),
        body = %cfg.render.body_font.display(),
        "Loaded fonts"
    );

    let http = scrapers::http_client(cfg.http_timeout)?;
    Ok(Resources {
        llm_config,
        llm_template,
        fonts,
        http,
    })
}

/// One full pass: news to published carousel.
///
/// Staging and output directories created by this run are removed when it
/// returns, whichever way, unless artifacts are kept. `carousel.json` goes next
/// to the ledger so it survives the cleanup.
#[instrument(level = "info", skip_all)]
async fn run_once(cfg: &PipelineConfig, res: &Resources) -> Result<RunSummary, Box<dyn Error>> {
    let start = Instant::now();
    let staging = ScopedDir::new(&cfg.staging_dir, cfg.keep_artifacts);
    let output = ScopedDir::new(&cfg.output_dir, cfg.keep_artifacts);
    ensure_writable_dir(output.path()).await?;

    let api = llm_client(&res.llm_config, &res.llm_template);

    // ---- Index and curate ----
    let articles = scrapers::newsapi::fetch_news(&res.http, cfg).await;
    if articles.is_empty() {
        return Err("no news articles to choose from".into());
    }

    let shortlist = curator::select_interesting_articles(&api, &articles).await?;
    let mut ledger = PublishedLedger::load(&cfg.published_ledger).await?;
    let story = curator::review_articles(&api, shortlist, &mut ledger).await?;

    let content = scrapers::article::scrape_article(&res.http, &story.url).await;
    if content.trim().is_empty() {
        return Err(format!("no article text at {}", story.url).into());
    }
    let post = curator::generate_carousel(&api, &content).await?;

    // ---- Assemble ----
    let mut summary = RunSummary {
        requested: post.slides.len(),
        ..Default::default()
    };
    let candidates = UnsplashSource::new(
        res.http.clone(),
        require(&cfg.credentials.image_api_key, "IMAGE_API_KEY")?,
    );
    let ranker = LlmRanker::new(&api);
    let acquirer = ImageAcquirer::new(HttpImageSource::new(res.http.clone()), staging.path());
    let assembler = CarouselAssembler::new(&candidates, &ranker, &acquirer, cfg.duplicate_policy);

    let slides = assembler.assemble(&post.slides).await;
    summary.assembled = slides.len();
    if let Err(e) = outputs::json::write_carousel(&slides, cfg.persistent_dir()).await {
        warn!(error = %e, "Could not write carousel.json");
    }

    // ---- Compose ----
    let compositor = Compositor::new(&res.fonts, &cfg.render);
    let composed = compose_slides(&slides, &compositor, output.path()).await?;
    summary.composed = composed.len();

    if composed.is_empty() {
        warn!(requested = summary.requested, "No slide survived; nothing to publish");
    } else if cfg.dry_run {
        info!(
            composed = composed.len(),
            dir = %output.path().display(),
            "Dry run; skipping upload and publish"
        );
    } else {
        // ---- Publish ----
        let creds = &cfg.credentials;
        let uploader = CloudinaryUploader::new(
            res.http.clone(),
            require(&creds.cloudinary_cloud_name, "CLOUDINARY_CLOUD_NAME")?,
            require(&creds.cloudinary_upload_preset, "CLOUDINARY_UPLOAD_PRESET")?,
        );
        let publisher = InstagramPublisher::new(
            res.http.clone(),
            require(&creds.ig_user_id, "IG_USER_ID")?,
            require(&creds.instagram_access_token, "INSTAGRAM_ACCESS_TOKEN")?,
        );

        let urls = uploader.upload_all(&composed).await;
        let report = publisher.publish_carousel(&post.detailed_caption, &urls).await?;
        info!(
            post_id = %report.post_id,
            items = report.published_items(),
            failed_items = report.items.len() - report.published_items(),
            "Post created"
        );
        summary.post_id = Some(report.post_id);
    }

    let elapsed = start.elapsed();
    info!(
        story = %story.title,
        requested = summary.requested,
        assembled = summary.assembled,
        composed = summary.composed,
        post_id = summary.post_id.as_deref().unwrap_or("-"),
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Run complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_rejects_missing_and_empty() {
        assert_eq!(require(&Some("v".into()), "X").unwrap(), "v");
        assert!(require(&None, "X").unwrap_err().to_string().contains("X is not set"));
        assert!(require(&Some(String::new()), "X").is_err());
    }
}
