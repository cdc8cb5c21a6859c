use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::{
    material::MaterialAsset, skeleton::Skeleton, subset::MaterialSubset, vertex::SkinnedVertex,
};

const BOUNDS_WEIGHT_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Box around `points`. Empty input gives a zero box at the origin.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut points = points.into_iter();
        let Some(first) = points.next() else {
            return Self::default();
        };
        points.fold(Self { min: first, max: first }, |aabb, point| Self {
            min: aabb.min.min(point),
            max: aabb.max.max(point),
        })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }
}

/// Flattened, render-ready skinned mesh. Immutable once imported.
#[derive(Debug, Clone)]
pub struct SkeletalMeshAsset {
    pub name: Option<String>,
    pub vertices: Vec<SkinnedVertex>,
    pub indices: Vec<u32>,
    pub subsets: Vec<MaterialSubset>,
    pub materials: Vec<Arc<MaterialAsset>>,
    pub skeleton: Arc<Skeleton>,
    pub bounds: Aabb,
}

impl SkeletalMeshAsset {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn subset_material(&self, subset: &MaterialSubset) -> Option<&Arc<MaterialAsset>> {
        self.materials.get(subset.material)
    }

    /// Indices of `subset`, or an empty slice if it lies outside the buffer.
    pub fn subset_indices(&self, subset: &MaterialSubset) -> &[u32] {
        let start = subset.index_start as usize;
        let end = subset.index_end() as usize;
        self.indices.get(start..end).unwrap_or_default()
    }

    /// Bounds of the bind vertices placed by their bones' geometry offsets.
    pub fn compute_bounds(vertices: &[SkinnedVertex], skeleton: &Skeleton) -> Aabb {
        Aabb::from_points(vertices.iter().map(|vertex| {
            let position = vertex.position();
            let mut placed = Vec3::ZERO;
            let mut skinned = false;
            for (&bone, &weight) in vertex.bones.iter().zip(&vertex.weights) {
                if weight <= BOUNDS_WEIGHT_EPSILON {
                    continue;
                }
                let Some(bone) = skeleton.bone(bone as usize) else {
                    continue;
                };
                placed += offset_point(bone.geometry_offset, position) * weight;
                skinned = true;
            }
            if skinned {
                placed
            } else {
                position
            }
        }))
    }
}

#[inline]
fn offset_point(offset: Mat4, position: Vec3) -> Vec3 {
    offset.transform_point3(position)
}

#[cfg(test)]
mod test {
    use glam::{Mat4, Vec2, Vec3};

    use super::{Aabb, SkeletalMeshAsset};
    use crate::{
        skeleton::Skeleton,
        vertex::SkinnedVertex,
        weights::{BoneInfluence, BoneInfluences},
    };

    #[test]
    fn test_aabb() {
        assert_eq!(Aabb::from_points(Vec::<Vec3>::new()), Aabb::default());
        let aabb = Aabb::from_points([Vec3::new(1.0, -2.0, 0.0), Vec3::new(-1.0, 3.0, 0.5)]);
        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 3.0, 0.5));
        assert_eq!(aabb.center(), Vec3::new(0.0, 0.5, 0.25));
    }

    #[test]
    fn test_bounds_follow_geometry_offset() {
        let mut skeleton = Skeleton::new();
        skeleton
            .add_bone(
                "root",
                None,
                Mat4::IDENTITY,
                Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)),
            )
            .unwrap();
        let bound = SkinnedVertex::new(Vec3::ZERO, Vec3::Z, Vec2::ZERO, &BoneInfluences::root());
        let loose = SkinnedVertex::new(Vec3::ONE, Vec3::Z, Vec2::ZERO, &BoneInfluences::new());
        let far: BoneInfluences = [BoneInfluence::new(9, 1.0)].into_iter().collect();
        let invalid = SkinnedVertex::new(Vec3::NEG_ONE, Vec3::Z, Vec2::ZERO, &far);

        let aabb = SkeletalMeshAsset::compute_bounds(&[bound, loose, invalid], &skeleton);
        assert_eq!(aabb.min, Vec3::NEG_ONE);
        assert_eq!(aabb.max, Vec3::new(10.0, 1.0, 1.0));
    }
}
