//! Raw scene data as delivered by an external scene reader.
//!
//! Nothing in here is validated. The import pipeline in [`crate::loader`]
//! decides what is structural and what can be patched with defaults.

use std::{error::Error, path::Path};

use glam::Mat4;

#[cfg(feature = "json")]
pub mod json;
pub mod memory;

/// How an attribute array is laid out relative to the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MappingMode {
    /// One value per control point.
    ByControlPoint,
    /// One value per polygon corner.
    #[default]
    ByPolygonVertex,
    /// Any other layout the reader delivered. Resolves to defaults.
    Unsupported,
}

/// How an attribute value is addressed once the target slot is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReferenceMode {
    #[default]
    Direct,
    IndexToDirect,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AttributeSource<T> {
    pub mapping: MappingMode,
    pub reference: ReferenceMode,
    pub direct: Vec<T>,
    pub index: Vec<i32>,
}

impl<T> Default for AttributeSource<T> {
    fn default() -> Self {
        Self {
            mapping: MappingMode::default(),
            reference: ReferenceMode::default(),
            direct: Vec::new(),
            index: Vec::new(),
        }
    }
}

impl<T> AttributeSource<T> {
    pub fn by_control_point(direct: Vec<T>) -> Self {
        Self {
            mapping: MappingMode::ByControlPoint,
            reference: ReferenceMode::Direct,
            direct,
            index: Vec::new(),
        }
    }

    pub fn by_polygon_vertex(direct: Vec<T>) -> Self {
        Self {
            mapping: MappingMode::ByPolygonVertex,
            reference: ReferenceMode::Direct,
            direct,
            index: Vec::new(),
        }
    }

    pub fn indexed(mut self, index: Vec<i32>) -> Self {
        self.reference = ReferenceMode::IndexToDirect;
        self.index = index;
        self
    }
}

/// A node in the raw scene graph. Parents are arena indices and may be
/// dangling or cyclic in malformed input.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RawNode {
    pub name: String,
    pub parent: Option<usize>,
    pub global_transform: Mat4,
    /// Skeleton-typed node. Such nodes become bones even without weights.
    pub is_bone: bool,
}

/// One bone's sparse influence list over a mesh's control points.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RawCluster {
    pub bone: String,
    pub indices: Vec<i32>,
    pub weights: Vec<f32>,
    /// Bone global transform at bind time.
    pub transform_link: Option<Mat4>,
    /// Mesh transform at bind time, used as the bone's geometry offset.
    pub transform: Option<Mat4>,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MaterialMapping {
    /// Every polygon uses slot 0.
    #[default]
    AllSame,
    /// One slot index per polygon.
    ByPolygon(Vec<i32>),
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RawMesh {
    pub name: String,
    /// Node the mesh is attached to.
    pub node: Option<usize>,
    /// Mesh transform at bind time. Falls back to the node's global transform.
    pub bind_transform: Option<Mat4>,
    pub control_points: Vec<[f32; 3]>,
    /// Triangulated control point indices, three per polygon.
    pub polygon_vertices: Vec<i32>,
    /// Normal layers. The first per-corner layer wins over per-control-point ones.
    pub normals: Vec<AttributeSource<[f32; 3]>>,
    pub uvs: Vec<AttributeSource<[f32; 2]>>,
    pub clusters: Vec<RawCluster>,
    /// Indices into [`RawScene::materials`]. `None` is an empty slot.
    pub material_slots: Vec<Option<usize>>,
    pub material_mapping: MaterialMapping,
}

impl RawMesh {
    pub fn polygon_count(&self) -> usize {
        self.polygon_vertices.len() / 3
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RawTexture {
    pub file_name: String,
    pub relative_file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RawMaterialTextures {
    pub base_color: Option<RawTexture>,
    pub normal: Option<RawTexture>,
    pub specular: Option<RawTexture>,
    pub emissive: Option<RawTexture>,
    pub opacity: Option<RawTexture>,
    pub metallic: Option<RawTexture>,
    pub roughness: Option<RawTexture>,
    pub occlusion: Option<RawTexture>,
}

/// Property bundle of a source material. Absent properties take
/// defaults during conversion.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RawMaterial {
    pub name: String,
    pub diffuse: Option<[f32; 3]>,
    pub diffuse_factor: Option<f32>,
    pub base_color: Option<[f32; 3]>,
    pub specular: Option<[f32; 3]>,
    pub specular_factor: Option<f32>,
    pub shininess: Option<f32>,
    pub emissive: Option<[f32; 3]>,
    pub emissive_factor: Option<f32>,
    pub transparency_factor: Option<f32>,
    pub metallic: Option<f32>,
    pub roughness: Option<f32>,
    pub textures: RawMaterialTextures,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RawScene {
    /// Directory of the source file, for texture path resolution.
    pub directory: Option<String>,
    pub nodes: Vec<RawNode>,
    pub meshes: Vec<RawMesh>,
    pub materials: Vec<RawMaterial>,
}

impl RawScene {
    /// Index of the first node carrying `name`.
    pub fn find_node(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.name == name)
    }

    /// Bind-time transform of `mesh`: its own if recorded, else that of its
    /// node, else identity.
    pub fn mesh_transform(&self, mesh: &RawMesh) -> Mat4 {
        mesh.bind_transform
            .or_else(|| {
                mesh.node
                    .and_then(|node| self.nodes.get(node))
                    .map(|node| node.global_transform)
            })
            .unwrap_or(Mat4::IDENTITY)
    }
}

/// Collaborator that reads raw scenes. Performs all I/O on behalf of the
/// importer.
pub trait SceneSource {
    type Error: Error;

    /// Read the scene at `path`, or `Ok(None)` if nothing lives there.
    fn read_scene(&mut self, path: &Path) -> Result<Option<RawScene>, Self::Error>;
}
