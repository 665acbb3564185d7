pub mod classify;
pub mod error;
pub mod geometry;
pub mod id;
pub mod layers;
pub mod model;
pub mod record;

pub use classify::{classify, classify_legacy};
pub use error::{SceneError, SceneResult};
pub use id::ObjectId;
pub use layers::{LayerViolation, check_layering, refresh_boundaries, reorder};
pub use model::*;
pub use record::{ObjectRecord, RecordFilter, SCENE_VERSION, SceneRecord, objects_from_records};

// Re-export kurbo types so downstream crates share one geometry vocabulary
pub use kurbo::{Affine, Point, Vec2};
