//! Carousel core: fingerprinting, duplicate avoidance, image acquisition,
//! text layout, compositing and per-slide assembly.
//!
//! Everything here reports [`crate::error::CarouselError`]; the network-facing
//! collaborators (image search, ranking, byte download, glyph drawing) are
//! traits so the core can be driven by stubs.

pub mod acquire;
pub mod assembler;
pub mod compositor;
pub mod dedup;
pub mod fingerprint;
pub mod layout;

pub use acquire::{HttpImageSource, ImageAcquirer, ImageSource};
pub use assembler::{CandidateRanker, CandidateSource, CarouselAssembler, compose_slides};
pub use compositor::{Compositor, FontPair, Typesetter};
pub use dedup::DuplicatePolicy;
pub use fingerprint::Fingerprint;
