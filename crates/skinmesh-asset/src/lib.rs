//! Import skinned meshes from scene graphs.
//!
//! This library turns a raw, FBX-like scene (nodes, meshes with skin
//! clusters and materials) into a single render-ready skeletal mesh:
//! deduplicated vertices with at most four bone influences, a flat index
//! buffer split into per-material subsets, and a skeleton whose bones are
//! ordered parents first. Scenes are read through [`source::SceneSource`],
//! so the importer itself never touches the file system.
//!
pub mod attribute;
/// Scene import and mesh caching
pub mod loader;
pub mod material;
pub mod mesh;
pub mod skeleton;
pub mod source;
pub mod subset;
pub mod vertex;
pub mod weights;
