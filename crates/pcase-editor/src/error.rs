use crate::ai::AiError;
use crate::host::LoadError;
use pcase_core::{ObjectId, Role, SceneError};
use pcase_render::RenderError;
use thiserror::Error;

/// Errors surfaced by editor operations.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("no object with id `{0}`")]
    NotFound(ObjectId),

    #[error("`{0}` is a template layer and cannot be edited")]
    SystemObject(ObjectId),

    #[error("`{0}` is held by a frame; its clip belongs to the frame")]
    FrameLinked(ObjectId),

    #[error("`{0}` has no crop to update")]
    NoCrop(ObjectId),

    #[error("`{0}` is not a photo")]
    NotAnImage(ObjectId),

    #[error("`{0}` already has an AI replacement running")]
    AiPending(ObjectId),

    #[error("a {0:?} layer cannot be inserted from an image")]
    NotInsertable(Role),

    #[error("invalid barcode value: {0}")]
    InvalidBarcode(String),

    #[error("design layer set is malformed: {0}")]
    DesignLayers(String),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("image load failed: {0}")]
    Load(#[from] LoadError),

    #[error("AI replacement failed: {0}")]
    Ai(#[from] AiError),
}

pub type EditorResult<T> = Result<T, EditorError>;
