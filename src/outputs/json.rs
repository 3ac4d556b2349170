//! `carousel.json`, the assembled carousel as pretty JSON.
//!
//! Written before composition so a run that dies while rendering or
//! publishing still leaves the chosen images and copy on disk for inspection.

use crate::models::RenderedSlide;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

pub const CAROUSEL_FILE: &str = "carousel.json";

/// Write `slides` to `<output_dir>/carousel.json` and return the path.
#[instrument(
    level = "info",
    skip_all,
    fields(output_dir = %output_dir.display(), slides = slides.len())
)]
pub async fn write_carousel(
    slides: &[RenderedSlide],
    output_dir: &Path,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(slides)?;

    if let Err(e) = fs::create_dir_all(output_dir).await {
        error!(error = %e, "Failed to create output dir");
        return Err(e.into());
    }

    let path = output_dir.join(CAROUSEL_FILE);
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote carousel JSON");
    Ok(path)
}
