//! Command-line interface definitions for the carousel pipeline.
//!
//! Every credential can come from a flag or an environment variable; every
//! other option has a default so a bare invocation with the environment set
//! runs one full pipeline pass.

use clap::Parser;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # One run, credentials from the environment
/// viral_carousel
///
/// # Render only, keep the slides on disk
/// viral_carousel --dry-run -o ./slides
///
/// # Post every 77 minutes, treat near-identical photos as duplicates
/// viral_carousel --interval-minutes 77 --similarity-threshold 6
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// NewsAPI key
    #[arg(long, env = "NEWS_API_KEY", hide_env_values = true)]
    pub news_api_key: Option<String>,

    /// Unsplash access key used for image search
    #[arg(long, env = "IMAGE_API_KEY", hide_env_values = true)]
    pub image_api_key: Option<String>,

    /// Instagram Graph API access token
    #[arg(long, env = "INSTAGRAM_ACCESS_TOKEN", hide_env_values = true)]
    pub instagram_access_token: Option<String>,

    /// Instagram business account id
    #[arg(long, env = "IG_USER_ID")]
    pub ig_user_id: Option<String>,

    /// Cloudinary cloud name
    #[arg(long, env = "CLOUDINARY_CLOUD_NAME")]
    pub cloudinary_cloud_name: Option<String>,

    /// Cloudinary unsigned upload preset
    #[arg(long, env = "CLOUDINARY_UPLOAD_PRESET")]
    pub cloudinary_upload_preset: Option<String>,

    /// News search query
    #[arg(short, long, default_value = "technology")]
    pub query: String,

    /// How many days back to search for news
    #[arg(long, default_value_t = 2)]
    pub lookback_days: i64,

    /// Optional path to the language-model config.yaml
    #[arg(short, long)]
    pub config: Option<String>,

    /// Prompt template name
    #[arg(short, long, default_value = "carousel_curator")]
    pub template: String,

    /// Optional YAML file overriding overlay geometry and fonts
    #[arg(short, long)]
    pub render_config: Option<String>,

    /// Directory for downloaded source images
    #[arg(long, default_value = "input_images")]
    pub staging_dir: String,

    /// Directory for rendered slides
    #[arg(short, long, default_value = "output_images")]
    pub output_dir: String,

    /// Ledger of already published articles
    #[arg(long, default_value = "published_articles.json")]
    pub published_file: String,

    /// Timeout for each HTTP request, in seconds
    #[arg(long, default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Max Hamming distance at which two images count as duplicates (0 = identical only)
    #[arg(long, default_value_t = 0)]
    pub similarity_threshold: u32,

    /// Render slides but skip upload and publishing
    #[arg(long)]
    pub dry_run: bool,

    /// Keep staged and rendered images after the run
    #[arg(long)]
    pub keep_artifacts: bool,

    /// Repeat the pipeline every N minutes
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_minutes: Option<u64>,
}
