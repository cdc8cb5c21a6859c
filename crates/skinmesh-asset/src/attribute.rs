//! Per-corner normal and UV reconstruction.

use glam::{Vec2, Vec3};
use log::warn;

use crate::source::{AttributeSource, MappingMode, RawMesh, ReferenceMode};

pub const DEFAULT_NORMAL: Vec3 = Vec3::Z;
pub const DEFAULT_UV: Vec2 = Vec2::ZERO;

const NEARLY_ZERO_SQUARED: f32 = 1e-12;

/// Read `direct[target]`, or `direct[index[target]]` when indexed.
pub fn resolve<T: Copy>(
    reference: ReferenceMode,
    direct: &[T],
    index: &[i32],
    target: usize,
) -> Option<T> {
    let slot = match reference {
        ReferenceMode::Direct => target,
        ReferenceMode::IndexToDirect => usize::try_from(*index.get(target)?).ok()?,
    };
    direct.get(slot).copied()
}

impl<T: Copy> AttributeSource<T> {
    /// Value for one polygon corner, addressed by whichever of
    /// `control_point` or `corner` the mapping mode uses.
    pub fn value_for(&self, control_point: usize, corner: usize) -> Option<T> {
        let target = match self.mapping {
            MappingMode::ByControlPoint => control_point,
            MappingMode::ByPolygonVertex => corner,
            MappingMode::Unsupported => return None,
        };
        resolve(self.reference, &self.direct, &self.index, target)
    }
}

/// First per-corner layer, or failing that the first per-control-point one.
pub fn select_layer<T>(layers: &[AttributeSource<T>]) -> Option<&AttributeSource<T>> {
    layers
        .iter()
        .find(|layer| layer.mapping == MappingMode::ByPolygonVertex)
        .or_else(|| {
            layers
                .iter()
                .find(|layer| layer.mapping == MappingMode::ByControlPoint)
        })
}

fn reconstruct<T: Copy, U: Copy>(
    mesh: &RawMesh,
    layers: &[AttributeSource<T>],
    attribute: &str,
    default: U,
    convert: impl Fn(T) -> U,
) -> Vec<U> {
    let corners = mesh.polygon_vertices.len();
    let Some(layer) = select_layer(layers) else {
        if corners > 0 {
            warn!(
                "Mesh {:?} has no usable {} layer, using defaults",
                mesh.name, attribute
            );
        }
        return vec![default; corners];
    };

    let mut missing = 0usize;
    let values: Vec<U> = mesh
        .polygon_vertices
        .iter()
        .enumerate()
        .map(|(corner, &control_point)| {
            let value = usize::try_from(control_point)
                .ok()
                .and_then(|control_point| layer.value_for(control_point, corner));
            match value {
                Some(value) => convert(value),
                None => {
                    missing += 1;
                    default
                }
            }
        })
        .collect();
    if missing > 0 {
        warn!(
            "Mesh {:?}: {} of {} corners have no {}, using defaults",
            mesh.name, missing, corners, attribute
        );
    }
    values
}

/// Unit normal for every polygon corner of `mesh`.
pub fn reconstruct_normals(mesh: &RawMesh) -> Vec<Vec3> {
    reconstruct(mesh, &mesh.normals, "normal", DEFAULT_NORMAL, |normal| {
        normalize_or_default(Vec3::from_array(normal))
    })
}

/// Texture coordinate for every polygon corner of `mesh`. With `flip_v`
/// the V axis is mirrored to a top-left origin.
pub fn reconstruct_uvs(mesh: &RawMesh, flip_v: bool) -> Vec<Vec2> {
    reconstruct(mesh, &mesh.uvs, "UV", DEFAULT_UV, |[u, v]| {
        if flip_v {
            Vec2::new(u, 1.0 - v)
        } else {
            Vec2::new(u, v)
        }
    })
}

pub fn normalize_or_default(normal: Vec3) -> Vec3 {
    if normal.length_squared() <= NEARLY_ZERO_SQUARED {
        return DEFAULT_NORMAL;
    }
    let normal = normal.normalize_or_zero();
    if normal == Vec3::ZERO {
        DEFAULT_NORMAL
    } else {
        normal
    }
}

#[cfg(test)]
mod test {
    use glam::{Vec2, Vec3};

    use super::{reconstruct_normals, reconstruct_uvs, resolve, DEFAULT_NORMAL};
    use crate::source::{AttributeSource, MappingMode, RawMesh, ReferenceMode};

    fn quad() -> RawMesh {
        RawMesh {
            name: String::from("quad"),
            control_points: vec![[0.0; 3], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            polygon_vertices: vec![0, 1, 2, 0, 2, 3],
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_reference_modes() {
        let direct = [10, 20, 30];
        assert_eq!(resolve(ReferenceMode::Direct, &direct, &[], 1), Some(20));
        assert_eq!(resolve(ReferenceMode::IndexToDirect, &direct, &[2, 0], 0), Some(30));
        assert_eq!(resolve(ReferenceMode::IndexToDirect, &direct, &[-1], 0), None);
        assert_eq!(resolve(ReferenceMode::IndexToDirect, &direct, &[7], 0), None);
        assert_eq!(resolve(ReferenceMode::Direct, &direct, &[], 3), None);
    }

    #[test]
    fn test_per_control_point_normals() {
        let mut mesh = quad();
        mesh.normals = vec![AttributeSource::by_control_point(vec![
            [0.0, 0.0, 2.0],
            [0.0, 1.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 0.0, -1.0],
        ])];
        let normals = reconstruct_normals(&mesh);
        assert_eq!(normals.len(), 6);
        assert_eq!(normals[0], Vec3::Z);
        assert_eq!(normals[3], Vec3::Z);
        assert_eq!(normals[4], Vec3::X);
        assert_eq!(normals[5], Vec3::NEG_Z);
    }

    #[test]
    fn test_corner_layer_takes_precedence() {
        let mut mesh = quad();
        mesh.normals = vec![
            AttributeSource::by_control_point(vec![[1.0, 0.0, 0.0]; 4]),
            AttributeSource::by_polygon_vertex(vec![[0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
                .indexed(vec![0, 0, 0, 1, 1, 1]),
        ];
        let normals = reconstruct_normals(&mesh);
        assert_eq!(&normals[..3], &[Vec3::Y; 3]);
        assert_eq!(&normals[3..], &[Vec3::Z; 3]);
    }

    #[test]
    fn test_defaults() {
        let mut mesh = quad();
        mesh.normals = vec![AttributeSource {
            mapping: MappingMode::Unsupported,
            ..Default::default()
        }];
        assert_eq!(reconstruct_normals(&mesh), vec![DEFAULT_NORMAL; 6]);
        assert_eq!(reconstruct_uvs(&mesh, true), vec![Vec2::ZERO; 6]);

        mesh.normals = vec![AttributeSource::by_polygon_vertex(vec![[0.0; 3]; 6])];
        assert_eq!(reconstruct_normals(&mesh), vec![DEFAULT_NORMAL; 6]);
    }

    #[test]
    fn test_short_layer_pads_with_defaults() {
        let mut mesh = quad();
        mesh.uvs = vec![AttributeSource::by_polygon_vertex(vec![[0.25, 0.25]; 4])];
        let uvs = reconstruct_uvs(&mesh, false);
        assert_eq!(uvs[3], Vec2::splat(0.25));
        assert_eq!(uvs[4], Vec2::ZERO);
    }

    #[test]
    fn test_flip_v() {
        let mut mesh = quad();
        mesh.uvs = vec![AttributeSource::by_control_point(vec![[0.5, 0.25]; 4])];
        assert_eq!(reconstruct_uvs(&mesh, true)[0], Vec2::new(0.5, 0.75));
        assert_eq!(reconstruct_uvs(&mesh, false)[0], Vec2::new(0.5, 0.25));
    }
}
