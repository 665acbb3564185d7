use thiserror::Error;

/// Errors raised while reading or writing the scene wire format.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("scene JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("scene payload is empty")]
    Empty,

    #[error("unsupported scene version {0}")]
    Version(u32),

    #[error("unsupported object type `{0}`")]
    UnsupportedType(String),
}

pub type SceneResult<T> = Result<T, SceneError>;
