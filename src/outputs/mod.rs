//! Everything the pipeline writes or sends once slides exist.
//!
//! - [`json`]: `carousel.json` development dump of the assembled slides
//! - [`cloudinary`]: uploads rendered slides and returns their public URLs
//! - [`instagram`]: creates item containers, the carousel container, and publishes
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── carousel.json
//! ├── output_<keyword>.jpg
//! └── output_<keyword>-2.jpg   # same keyword on two slides
//! ```

pub mod cloudinary;
pub mod instagram;
pub mod json;
