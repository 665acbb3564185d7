//! Services the editor awaits on, supplied by the embedding environment.

use std::future::Future;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("request for `{url}` failed: {reason}")]
    Network { url: String, reason: String },

    #[error("`{0}` could not be decoded as an image")]
    Decode(String),
}

/// A decoded image, identified by the URL it was loaded from.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedImage {
    pub src: String,
    pub width: f64,
    pub height: f64,
}

/// Image loading and frame scheduling.
///
/// Futures are not required to be `Send`; everything runs on one thread.
pub trait EditorHost {
    fn load_image(&self, url: &str) -> impl Future<Output = Result<LoadedImage, LoadError>>;

    /// Resolves on the next render frame.
    fn next_frame(&self) -> impl Future<Output = ()>;
}
