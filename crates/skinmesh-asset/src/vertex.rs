use std::collections::{hash_map::Entry, HashMap};

use glam::{Vec2, Vec3};

use crate::weights::{BoneInfluences, MAX_BONE_INFLUENCES};

/// Bind-pose vertex as stored in the finished mesh.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct SkinnedVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub bones: [u32; MAX_BONE_INFLUENCES],
    pub weights: [f32; MAX_BONE_INFLUENCES],
}

const KEY_LEN: usize = 3 + 3 + 2 + MAX_BONE_INFLUENCES * 2;

/// Bit pattern of every field of a [`SkinnedVertex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexKey([u32; KEY_LEN]);

impl SkinnedVertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2, influences: &BoneInfluences) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv: uv.to_array(),
            bones: influences.bones(),
            weights: influences.weights(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }

    pub fn key(&self) -> VertexKey {
        let mut key = [0u32; KEY_LEN];
        let floats = self
            .position
            .iter()
            .chain(&self.normal)
            .chain(&self.uv)
            .map(|value| value.to_bits());
        let bones = self.bones.iter().copied();
        let weights = self.weights.iter().map(|value| value.to_bits());
        for (slot, bits) in key.iter_mut().zip(floats.chain(bones).chain(weights)) {
            *slot = bits;
        }
        VertexKey(key)
    }
}

/// Merges bit-identical vertices while building a triangle index stream.
///
/// Vertices are numbered in first-seen order, so a fixed input always
/// produces the same buffers.
#[derive(Debug, Default)]
pub struct VertexDeduplicator {
    vertices: Vec<SkinnedVertex>,
    indices: Vec<u32>,
    lookup: HashMap<VertexKey, u32>,
}

impl VertexDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(corners: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(corners),
            indices: Vec::with_capacity(corners),
            lookup: HashMap::with_capacity(corners),
        }
    }

    /// Append one corner, returning the index it was assigned.
    pub fn push(&mut self, vertex: SkinnedVertex) -> u32 {
        let index = match self.lookup.entry(vertex.key()) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let index = self.vertices.len() as u32;
                self.vertices.push(vertex);
                *entry.insert(index)
            }
        };
        self.indices.push(index);
        index
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn finish(self) -> (Vec<SkinnedVertex>, Vec<u32>) {
        (self.vertices, self.indices)
    }
}

#[cfg(test)]
mod test {
    use glam::{Vec2, Vec3};

    use super::{SkinnedVertex, VertexDeduplicator};
    use crate::weights::{BoneInfluence, BoneInfluences};

    fn vertex(x: f32) -> SkinnedVertex {
        SkinnedVertex::new(Vec3::new(x, 0.0, 0.0), Vec3::Z, Vec2::ZERO, &BoneInfluences::root())
    }

    #[test]
    fn test_identical_corners_share_index() {
        let mut dedup = VertexDeduplicator::new();
        let corners = [vertex(0.0), vertex(1.0), vertex(2.0), vertex(0.0), vertex(2.0), vertex(3.0)];
        for corner in corners {
            dedup.push(corner);
        }
        let (vertices, indices) = dedup.finish();
        assert_eq!(vertices.len(), 4);
        assert_eq!(indices, vec![0, 1, 2, 0, 2, 3]);
        for (corner, index) in corners.iter().zip(&indices) {
            assert_eq!(&vertices[*index as usize], corner);
        }
    }

    #[test]
    fn test_any_field_splits() {
        let base = vertex(0.0);
        let mut normal = base;
        normal.normal = [0.0, 1.0, 0.0];
        let mut uv = base;
        uv.uv = [0.0, 1.0];
        let mut weight = base;
        weight.weights = [0.5, 0.5, 0.0, 0.0];
        let mut bone = base;
        bone.bones = [1, 0, 0, 0];

        let mut dedup = VertexDeduplicator::new();
        for corner in [base, normal, uv, weight, bone, base] {
            dedup.push(corner);
        }
        assert_eq!(dedup.vertex_count(), 5);
        assert_eq!(dedup.index_count(), 6);
    }

    #[test]
    fn test_signed_zero_is_distinct() {
        let mut dedup = VertexDeduplicator::new();
        dedup.push(vertex(0.0));
        dedup.push(vertex(-0.0));
        assert_eq!(dedup.vertex_count(), 2);
    }

    #[test]
    fn test_padded_influences() {
        let influences: BoneInfluences = [BoneInfluence::new(3, 0.75), BoneInfluence::new(1, 0.25)]
            .into_iter()
            .collect();
        let vertex = SkinnedVertex::new(Vec3::ZERO, Vec3::Z, Vec2::ZERO, &influences);
        assert_eq!(vertex.bones, [3, 1, 0, 0]);
        assert_eq!(vertex.weights, [0.75, 0.25, 0.0, 0.0]);
    }
}
