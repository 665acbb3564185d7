//! AI image replacement seam.

use pcase_core::ObjectId;
use std::fmt;
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AiError {
    #[error("unknown style `{0}`")]
    UnknownStyle(String),

    #[error("AI service error: {0}")]
    Service(String),

    #[error("AI service returned no image")]
    EmptyResult,
}

/// Styles offered by the transformation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AiStyle {
    #[default]
    ToonInk,
    ToonMochi,
    ToonAnime,
    RemoveBg,
}

impl AiStyle {
    pub const ALL: [AiStyle; 4] = [
        AiStyle::ToonInk,
        AiStyle::ToonMochi,
        AiStyle::ToonAnime,
        AiStyle::RemoveBg,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AiStyle::ToonInk => "toon_ink",
            AiStyle::ToonMochi => "toon_mochi",
            AiStyle::ToonAnime => "toon_anime",
            AiStyle::RemoveBg => "remove_bg",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AiError> {
        Self::ALL
            .into_iter()
            .find(|style| style.as_str() == s)
            .ok_or_else(|| AiError::UnknownStyle(s.to_string()))
    }
}

impl fmt::Display for AiStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote image transformation: source URL in, replacement URL out.
pub trait AiService {
    fn transform(&self, image_url: &str, style: AiStyle) -> impl Future<Output = Result<String, AiError>>;
}

/// State captured when a replacement starts, needed to finish or roll back.
#[derive(Debug, Clone, PartialEq)]
pub struct AiJob {
    pub id: ObjectId,
    pub src: String,
    pub style: AiStyle,
    /// Opacity before the object was dimmed while processing.
    pub opacity: f64,
}
