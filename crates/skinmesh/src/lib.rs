//! CPU skinning of imported skeletal meshes.
//!
//! [`skinning`] holds the pure per-vertex evaluator. [`instance::SkinnedMeshInstance`]
//! owns a pose and caches the skinned buffers until the pose changes again.
pub mod instance;
pub mod skinning;

pub use instance::{SkinState, SkinnedMeshInstance};
