//! Small helpers for strings, model output and the filesystem.
//!
//! - Log truncation and JSON truncation detection for model responses
//! - Code-fence stripping for model JSON
//! - Keyword slugs and collision-free file names for staged/rendered images
//! - Output directory validation and scoped run directories

use std::error::Error;
use std::fs as stdfs;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Truncate a string for logging purposes.
///
/// Long strings are cut at a character boundary at or below `max` bytes with
/// `"…(+N bytes)"` appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// A model response cut off by its token limit fails with an EOF error; the
/// caller re-asks once when this returns `true`.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Strip a surrounding markdown code fence (```` ```json ... ``` ````) if present.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string ("json") on the opening fence line
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// File-name stem for an image search keyword.
///
/// Spaces become underscores; anything but ASCII alphanumerics, `-` and `_` is
/// dropped. An empty result falls back to `"image"`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(slugify_keyword("solar panels"), "solar_panels");
/// assert_eq!(slugify_keyword("AI/ML chips!"), "AIML_chips");
/// ```
pub fn slugify_keyword(keyword: &str) -> String {
    let slug: String = keyword
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if slug.is_empty() { "image".to_string() } else { slug }
}

/// First free path `dir/stem.ext`, `dir/stem-2.ext`, `dir/stem-3.ext`, ...
pub async fn unique_path(dir: &Path, stem: &str, ext: &str) -> std::io::Result<PathBuf> {
    let mut candidate = dir.join(format!("{stem}.{ext}"));
    let mut n = 2u32;
    while fs::try_exists(&candidate).await? {
        candidate = dir.join(format!("{stem}-{n}.{ext}"));
        n += 1;
    }
    Ok(candidate)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    // sync write through std fs for a simpler error surface
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Directory is writable");
    Ok(())
}

/// A run-scoped directory removed on drop unless kept.
///
/// Holds staging downloads and rendered slides so they disappear when a run
/// ends, whichever way it ends. Only a directory that did not exist when the
/// guard was created is removed; a pre-existing one is left alone.
#[derive(Debug)]
pub struct ScopedDir {
    path: PathBuf,
    keep: bool,
    owned: bool,
}

impl ScopedDir {
    pub fn new(path: impl Into<PathBuf>, keep: bool) -> Self {
        let path = path.into();
        let owned = !path.exists();
        if !owned && !keep {
            debug!(path = %path.display(), "Run directory already exists; it will not be removed");
        }
        Self { path, keep, owned }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedDir {
    fn drop(&mut self) {
        if self.keep || !self.owned {
            debug!(path = %self.path.display(), "Keeping run directory");
            return;
        }
        match stdfs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed run directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Could not remove run directory"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        let s = "é".repeat(10); // 2 bytes each
        let result = truncate_for_log(&s, 5);
        assert!(result.starts_with("éé…"));
        assert!(result.contains("(+16 bytes)"));
    }

    #[test]
    fn test_looks_truncated() {
        let json_eof = r#"{"field": "value"#;
        let err = serde_json::from_str::<serde_json::Value>(json_eof).unwrap_err();
        assert!(looks_truncated(&err));

        let syntax = serde_json::from_str::<serde_json::Value>("{nope}").unwrap_err();
        assert!(!looks_truncated(&syntax));
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n[1, 2]\n```\n"), "[1, 2]");
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn test_slugify_keyword() {
        assert_eq!(slugify_keyword("solar panels"), "solar_panels");
        assert_eq!(slugify_keyword("AI/ML chips!"), "AIML_chips");
        assert_eq!(slugify_keyword("  data-center  "), "data-center");
        assert_eq!(slugify_keyword("🚀"), "image");
    }

    #[tokio::test]
    async fn test_unique_path_appends_counter() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_path(dir.path(), "robot", "jpg").await.unwrap();
        assert_eq!(first, dir.path().join("robot.jpg"));

        std::fs::write(&first, b"x").unwrap();
        let second = unique_path(dir.path(), "robot", "jpg").await.unwrap();
        assert_eq!(second, dir.path().join("robot-2.jpg"));

        std::fs::write(&second, b"x").unwrap();
        let third = unique_path(dir.path(), "robot", "jpg").await.unwrap();
        assert_eq!(third, dir.path().join("robot-3.jpg"));
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert_eq!(std::fs::read_dir(&nested).unwrap().count(), 0);
    }

    #[test]
    fn test_scoped_dir_removes_unless_kept() {
        let root = tempfile::tempdir().unwrap();
        let gone = root.path().join("gone");
        let kept = root.path().join("kept");

        let scoped = ScopedDir::new(&gone, false);
        let keeper = ScopedDir::new(&kept, true);
        std::fs::create_dir_all(gone.join("inner")).unwrap();
        std::fs::create_dir_all(&kept).unwrap();
        drop(scoped);
        drop(keeper);
        drop(ScopedDir::new(root.path().join("never-created"), false));

        assert!(!gone.exists());
        assert!(kept.exists());
    }

    #[test]
    fn test_scoped_dir_leaves_existing_directory_and_its_files() {
        let root = tempfile::tempdir().unwrap();
        let ledger = root.path().join("published_articles.json");
        let photo = root.path().join("holiday.jpg");
        std::fs::write(&ledger, b"[]").unwrap();
        std::fs::write(&photo, b"jpeg").unwrap();

        let scoped = ScopedDir::new(root.path(), false);
        std::fs::write(scoped.path().join("output_robot.jpg"), b"slide").unwrap();
        drop(scoped);

        assert!(root.path().is_dir());
        assert_eq!(std::fs::read(&ledger).unwrap(), b"[]");
        assert_eq!(std::fs::read(&photo).unwrap(), b"jpeg");
    }
}
