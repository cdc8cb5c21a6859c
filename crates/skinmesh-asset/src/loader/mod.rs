use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    path::Path,
};

use log::debug;

use crate::{
    mesh::SkeletalMeshAsset,
    skeleton::SkeletonError,
    source::SceneSource,
    weights::{MAX_BONE_INFLUENCES, WEIGHT_EPSILON},
};

/// Per-path memoization of finished meshes.
pub mod cache;
mod import;

pub use import::import_scene;

/// Structural problems that make a scene impossible to import.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportError {
    Skeleton(SkeletonError),
    NoMeshes,
    NoControlPoints {
        mesh: String,
    },
    PolygonCountMismatch {
        mesh: String,
        count: usize,
    },
    ControlPointOutOfRange {
        mesh: String,
        corner: usize,
        index: i32,
        count: usize,
    },
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Skeleton(err) => Display::fmt(err, f),
            ImportError::NoMeshes => write!(f, "Scene contains no meshes"),
            ImportError::NoControlPoints { mesh } => {
                write!(f, "Mesh {:?} has no control points", mesh)
            }
            ImportError::PolygonCountMismatch { mesh, count } => write!(
                f,
                "Mesh {:?} has {} polygon vertices, which is not a whole number of triangles",
                mesh, count
            ),
            ImportError::ControlPointOutOfRange {
                mesh,
                corner,
                index,
                count,
            } => write!(
                f,
                "Corner {} of mesh {:?} refers to control point {}, but only {} exist",
                corner, mesh, index, count
            ),
        }
    }
}

impl Error for ImportError {}

impl From<SkeletonError> for ImportError {
    fn from(value: SkeletonError) -> Self {
        ImportError::Skeleton(value)
    }
}

#[derive(Debug)]
pub enum LoadError<E> {
    Source(E),
    SceneNotFound(String),
    Import(ImportError),
}

impl<E: Display> Display for LoadError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Source(err) => Display::fmt(err, f),
            LoadError::SceneNotFound(path) => write!(f, "Scene {} not found", path),
            LoadError::Import(err) => Display::fmt(err, f),
        }
    }
}

impl<E: Error> Error for LoadError<E> {}

impl<E> From<ImportError> for LoadError<E> {
    fn from(value: ImportError) -> Self {
        LoadError::Import(value)
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ImportParams {
    /// Influences kept per vertex, clamped to `1..=MAX_BONE_INFLUENCES`.
    pub max_influences: usize,
    /// Weight sums at or below this are treated as zero.
    pub weight_epsilon: f32,
    /// Store `1 - v` so textures address from the top-left.
    pub flip_uv_v: bool,
    /// Bake each mesh's bind transform into positions and normals.
    pub apply_mesh_transform: bool,
    /// Overrides the name taken from the first mesh.
    pub mesh_name: Option<String>,
}

impl Default for ImportParams {
    fn default() -> Self {
        Self {
            max_influences: MAX_BONE_INFLUENCES,
            weight_epsilon: WEIGHT_EPSILON,
            flip_uv_v: true,
            apply_mesh_transform: false,
            mesh_name: None,
        }
    }
}

impl ImportParams {
    pub(crate) fn influence_limit(&self) -> usize {
        self.max_influences.clamp(1, MAX_BONE_INFLUENCES)
    }
}

/// Read the scene at `path` from `source` and import it.
pub fn load_scene<S: SceneSource>(
    source: &mut S,
    path: &Path,
    params: &ImportParams,
) -> Result<SkeletalMeshAsset, LoadError<S::Error>> {
    let scene = source
        .read_scene(path)
        .map_err(LoadError::Source)?
        .ok_or_else(|| LoadError::SceneNotFound(path.display().to_string()))?;
    debug!(
        "Read scene {}: {} nodes, {} meshes, {} materials",
        path.display(),
        scene.nodes.len(),
        scene.meshes.len(),
        scene.materials.len()
    );
    Ok(import_scene(&scene, params)?)
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use super::{load_scene, ImportParams, LoadError};
    use crate::source::{memory::MemorySceneSource, RawMesh, RawScene};

    #[test]
    fn test_load_from_source() {
        let scene = RawScene {
            meshes: vec![RawMesh {
                name: String::from("tri"),
                control_points: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                polygon_vertices: vec![0, 1, 2],
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut source = MemorySceneSource::new().with_scene("tri.json", scene);
        let mesh = load_scene(&mut source, Path::new("tri.json"), &ImportParams::default()).unwrap();
        assert_eq!(mesh.name.as_deref(), Some("tri"));

        let missing = load_scene(&mut source, Path::new("nope.json"), &ImportParams::default());
        assert!(matches!(missing, Err(LoadError::SceneNotFound(_))));
    }
}
