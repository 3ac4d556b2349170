//! Error taxonomy for the carousel core.
//!
//! Pipeline glue (scrapers, curator, outputs) keeps using `Box<dyn Error>`;
//! everything under [`crate::carousel`] reports one of these kinds so the
//! assembler can decide per slide whether to skip or abort.

/// Convenience result type used across the carousel core.
pub type CarouselResult<T> = Result<T, CarouselError>;

/// Failure kinds surfaced by fingerprinting, acquisition, layout and compositing.
#[derive(thiserror::Error, Debug)]
pub enum CarouselError {
    /// Download or transport failure, including non-success HTTP status.
    #[error("network error: {0}")]
    Network(String),

    /// Image bytes could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A rendered slide could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// Layout bounds were unusable. Space pressure alone never produces this.
    #[error("layout error: {0}")]
    Layout(String),

    /// No candidate survived filtering or ranking. A skip signal, not a fault.
    #[error("no eligible candidate for '{0}'")]
    NoEligibleCandidate(String),

    /// Local staging or output file failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CarouselError {
    /// Build a [`CarouselError::Network`] value.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Build a [`CarouselError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`CarouselError::Layout`] value.
    pub fn layout(msg: impl Into<String>) -> Self {
        Self::Layout(msg.into())
    }
}

impl From<image::ImageError> for CarouselError {
    fn from(e: image::ImageError) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<reqwest::Error> for CarouselError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}
