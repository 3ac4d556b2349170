//! Run configuration, built once at start-up and passed down by reference.
//!
//! [`PipelineConfig`] gathers the CLI/environment values; [`RenderSettings`]
//! holds the overlay geometry and can be overridden from a YAML file. Nothing
//! in the crate reads the environment after [`PipelineConfig::from_cli`].

use crate::carousel::dedup::DuplicatePolicy;
use crate::cli::Cli;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

/// Geometry and styling of the text overlay.
///
/// Ratios are fractions of the canvas height; pixel values are absolute.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Font used for headings.
    pub heading_font: PathBuf,
    /// Font used for body copy.
    pub body_font: PathBuf,
    pub min_font_size: u32,
    /// Starting heading size as a fraction of canvas height.
    pub max_font_ratio: f32,
    /// Vertical budget for the heading block.
    pub heading_height_ratio: f32,
    /// Vertical budget for heading + gap + body.
    pub block_height_ratio: f32,
    /// The body search starts this many points below the heading's start.
    pub body_size_offset: u32,
    /// Horizontal margin on each side; text width is `width - 2 * side_margin`.
    pub side_margin: u32,
    pub bottom_margin: u32,
    /// Spacing between wrapped lines used when fitting.
    pub line_spacing: f32,
    /// Gap between heading and body reserved when fitting.
    pub budget_gap: f32,
    /// Gap between heading and body when drawing.
    pub section_gap: u32,
    pub backdrop_pad_x: u32,
    pub backdrop_pad_top: u32,
    /// Also the line advance below each line's ink.
    pub backdrop_pad_bottom: u32,
    pub corner_radius: u32,
    pub heading_backdrop_alpha: u8,
    pub body_backdrop_alpha: u8,
    pub jpeg_quality: u8,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            heading_font: PathBuf::from("fonts/Montserrat-Bold.ttf"),
            body_font: PathBuf::from("fonts/Montserrat-Regular.ttf"),
            min_font_size: 12,
            max_font_ratio: 0.045,
            heading_height_ratio: 0.15,
            block_height_ratio: 0.40,
            body_size_offset: 4,
            side_margin: 30,
            bottom_margin: 30,
            line_spacing: 10.0,
            budget_gap: 40.0,
            section_gap: 20,
            backdrop_pad_x: 10,
            backdrop_pad_top: 5,
            backdrop_pad_bottom: 15,
            corner_radius: 8,
            heading_backdrop_alpha: 220,
            body_backdrop_alpha: 160,
            jpeg_quality: 90,
        }
    }
}

impl RenderSettings {
    /// Load settings from YAML; missing keys keep their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, Box<dyn Error>> {
        let raw = std::fs::read_to_string(path)?;
        let settings: RenderSettings = serde_yaml::from_str(&raw)?;
        Ok(settings)
    }
}

/// Credentials for the external services.
#[derive(Clone, Default)]
pub struct Credentials {
    pub news_api_key: Option<String>,
    pub image_api_key: Option<String>,
    pub instagram_access_token: Option<String>,
    pub ig_user_id: Option<String>,
    pub cloudinary_cloud_name: Option<String>,
    pub cloudinary_upload_preset: Option<String>,
}

// Keys never reach the logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = |v: &Option<String>| if v.is_some() { "set" } else { "missing" };
        f.debug_struct("Credentials")
            .field("news_api_key", &set(&self.news_api_key))
            .field("image_api_key", &set(&self.image_api_key))
            .field("instagram_access_token", &set(&self.instagram_access_token))
            .field("ig_user_id", &set(&self.ig_user_id))
            .field("cloudinary_cloud_name", &set(&self.cloudinary_cloud_name))
            .field("cloudinary_upload_preset", &set(&self.cloudinary_upload_preset))
            .finish()
    }
}

/// Everything one pipeline run needs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub credentials: Credentials,
    pub news_query: String,
    pub lookback_days: i64,
    /// `awful_aj` config.yaml; `None` means the default config dir.
    pub llm_config_path: Option<PathBuf>,
    pub llm_template: String,
    pub staging_dir: PathBuf,
    pub output_dir: PathBuf,
    pub published_ledger: PathBuf,
    pub http_timeout: Duration,
    pub duplicate_policy: DuplicatePolicy,
    pub render: RenderSettings,
    pub dry_run: bool,
    pub keep_artifacts: bool,
    pub interval: Option<Duration>,
}

impl PipelineConfig {
    /// Resolve the CLI into a config, loading the render YAML if one was given.
    #[instrument(level = "info", skip_all)]
    pub fn from_cli(cli: &Cli) -> Result<Self, Box<dyn Error>> {
        let render = match &cli.render_config {
            Some(path) => {
                let settings = RenderSettings::from_yaml_file(Path::new(path))?;
                info!(%path, "Loaded render settings");
                settings
            }
            None => RenderSettings::default(),
        };

        Ok(Self {
            credentials: Credentials {
                news_api_key: cli.news_api_key.clone(),
                image_api_key: cli.image_api_key.clone(),
                instagram_access_token: cli.instagram_access_token.clone(),
                ig_user_id: cli.ig_user_id.clone(),
                cloudinary_cloud_name: cli.cloudinary_cloud_name.clone(),
                cloudinary_upload_preset: cli.cloudinary_upload_preset.clone(),
            },
            news_query: cli.query.clone(),
            lookback_days: cli.lookback_days,
            llm_config_path: cli.config.as_ref().map(PathBuf::from),
            llm_template: cli.template.clone(),
            staging_dir: PathBuf::from(&cli.staging_dir),
            output_dir: PathBuf::from(&cli.output_dir),
            published_ledger: PathBuf::from(&cli.published_file),
            http_timeout: Duration::from_secs(cli.http_timeout_secs),
            duplicate_policy: DuplicatePolicy::within(cli.similarity_threshold),
            render,
            dry_run: cli.dry_run,
            keep_artifacts: cli.keep_artifacts || cli.dry_run,
            interval: cli.interval_minutes.map(|m| Duration::from_secs(m * 60)),
        })
    }

    /// Directory for files that outlive a run: the one holding the ledger.
    pub fn persistent_dir(&self) -> &Path {
        match self.published_ledger.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }
}
