//! Bone influence accumulation and normalization.

use std::ops::Range;

use log::warn;

pub const MAX_BONE_INFLUENCES: usize = 4;
pub const WEIGHT_EPSILON: f32 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoneInfluence {
    pub bone: u32,
    pub weight: f32,
}

impl BoneInfluence {
    pub fn new(bone: u32, weight: f32) -> Self {
        Self { bone, weight }
    }
}

/// Up to [`MAX_BONE_INFLUENCES`] influences stored inline.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoneInfluences {
    entries: [BoneInfluence; MAX_BONE_INFLUENCES],
    count: u8,
}

impl BoneInfluences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full weight on bone 0, for vertices nothing else claims.
    pub fn root() -> Self {
        let mut influences = Self::new();
        influences.push(BoneInfluence::new(0, 1.0));
        influences
    }

    /// Append an influence. Returns `false` when already full.
    pub fn push(&mut self, influence: BoneInfluence) -> bool {
        let count = self.count as usize;
        if count == MAX_BONE_INFLUENCES {
            return false;
        }
        self.entries[count] = influence;
        self.count += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn as_slice(&self) -> &[BoneInfluence] {
        &self.entries[..self.count as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoneInfluence> {
        self.as_slice().iter()
    }

    /// Bone indices padded with zero.
    pub fn bones(&self) -> [u32; MAX_BONE_INFLUENCES] {
        self.entries.map(|entry| entry.bone)
    }

    /// Weights padded with zero.
    pub fn weights(&self) -> [f32; MAX_BONE_INFLUENCES] {
        self.entries.map(|entry| entry.weight)
    }

    pub fn total_weight(&self) -> f32 {
        self.iter().map(|entry| entry.weight).sum()
    }
}

impl FromIterator<BoneInfluence> for BoneInfluences {
    fn from_iter<T: IntoIterator<Item = BoneInfluence>>(iter: T) -> Self {
        let mut influences = Self::new();
        for influence in iter.into_iter().take(MAX_BONE_INFLUENCES) {
            influences.push(influence);
        }
        influences
    }
}

fn normalize_in_place(influences: &mut [BoneInfluence], epsilon: f32) {
    let sum: f32 = influences.iter().map(|entry| entry.weight).sum();
    if sum > epsilon {
        for entry in influences.iter_mut() {
            entry.weight /= sum;
        }
    } else {
        let uniform = 1.0 / influences.len() as f32;
        for entry in influences.iter_mut() {
            entry.weight = uniform;
        }
    }
}

/// Normalize, sort descending, keep the heaviest `max_influences`, then
/// normalize again. The last kept weight absorbs floating point drift so
/// the total is 1.
///
/// Ties keep their original order.
pub fn normalize_weights(influences: &mut Vec<BoneInfluence>, max_influences: usize, epsilon: f32) {
    if influences.is_empty() {
        return;
    }
    normalize_in_place(influences, epsilon);
    influences.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    influences.truncate(max_influences.max(1));
    normalize_in_place(influences, epsilon);

    if let Some((last, rest)) = influences.split_last_mut() {
        let rest_sum: f32 = rest.iter().map(|entry| entry.weight).sum();
        last.weight = (1.0 - rest_sum).max(0.0);
    }
}

/// Per control point influence lists, accumulated from any number of
/// clusters and mesh sections.
#[derive(Debug, Clone, Default)]
pub struct InfluenceTable {
    points: Vec<Vec<BoneInfluence>>,
}

impl InfluenceTable {
    pub fn new(control_points: usize) -> Self {
        Self {
            points: vec![Vec::new(); control_points],
        }
    }

    /// Append room for another mesh section, returning its control point range.
    pub fn extend(&mut self, control_points: usize) -> Range<usize> {
        let start = self.points.len();
        self.points.resize_with(start + control_points, Vec::new);
        start..self.points.len()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn influences(&self, control_point: usize) -> &[BoneInfluence] {
        self.points
            .get(control_point)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Record one influence. Returns `false` if the control point does not exist.
    pub fn add(&mut self, control_point: usize, bone: u32, weight: f32) -> bool {
        match self.points.get_mut(control_point) {
            Some(point) => {
                point.push(BoneInfluence::new(bone, weight));
                true
            }
            None => false,
        }
    }

    /// Record a cluster's sparse `(index, weight)` pairs for `bone`, with
    /// indices local to `section`. Returns how many pairs were dropped.
    pub fn add_cluster(
        &mut self,
        section: Range<usize>,
        bone: u32,
        indices: &[i32],
        weights: &[f32],
    ) -> usize {
        if indices.len() != weights.len() {
            warn!(
                "Cluster for bone #{} has {} indices but {} weights",
                bone,
                indices.len(),
                weights.len()
            );
        }
        let mut dropped = indices.len().abs_diff(weights.len());
        for (&index, &weight) in indices.iter().zip(weights) {
            let control_point = usize::try_from(index)
                .ok()
                .map(|index| section.start + index)
                .filter(|control_point| section.contains(control_point));
            let accepted = match control_point {
                Some(control_point) if weight >= 0.0 && weight.is_finite() => {
                    self.add(control_point, bone, weight)
                }
                _ => false,
            };
            if !accepted {
                dropped += 1;
            }
        }
        dropped
    }

    /// Normalize every control point and pack it into inline storage.
    pub fn normalize(self, max_influences: usize, epsilon: f32) -> Vec<BoneInfluences> {
        let max_influences = max_influences.clamp(1, MAX_BONE_INFLUENCES);
        self.points
            .into_iter()
            .map(|mut point| {
                normalize_weights(&mut point, max_influences, epsilon);
                point.into_iter().collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::{
        normalize_weights, BoneInfluence, BoneInfluences, InfluenceTable, MAX_BONE_INFLUENCES,
        WEIGHT_EPSILON,
    };

    fn influences(weights: &[f32]) -> Vec<BoneInfluence> {
        weights
            .iter()
            .enumerate()
            .map(|(bone, weight)| BoneInfluence::new(bone as u32, *weight))
            .collect()
    }

    fn total(influences: &[BoneInfluence]) -> f32 {
        influences.iter().map(|entry| entry.weight).sum()
    }

    #[test]
    fn test_five_influences_truncated_to_four() {
        let mut point = influences(&[0.5, 0.3, 0.1, 0.05, 0.05]);
        normalize_weights(&mut point, 4, WEIGHT_EPSILON);

        assert_eq!(point.len(), 4);
        assert!((total(&point) - 1.0).abs() < 1e-6);
        assert!(point.windows(2).all(|pair| pair[0].weight >= pair[1].weight));
        assert!(point[0].weight >= 0.5);
        // The first 0.05 was visited first and survives the tie.
        assert_eq!(point.iter().map(|entry| entry.bone).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_empty_is_noop() {
        let mut point = Vec::new();
        normalize_weights(&mut point, 4, WEIGHT_EPSILON);
        assert!(point.is_empty());
    }

    #[test]
    fn test_zero_weights_become_uniform() {
        let mut point = influences(&[0.0, 0.0]);
        normalize_weights(&mut point, 4, WEIGHT_EPSILON);
        assert_eq!(point[0].weight, 0.5);
        assert_eq!(point[1].weight, 0.5);
    }

    #[test]
    fn test_unnormalized_input() {
        let mut point = influences(&[2.0, 6.0]);
        normalize_weights(&mut point, 4, WEIGHT_EPSILON);
        assert_eq!(point[0].bone, 1);
        assert!((point[0].weight - 0.75).abs() < 1e-6);
        assert!((point[1].weight - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_single_influence() {
        let mut point = influences(&[0.2]);
        normalize_weights(&mut point, 4, WEIGHT_EPSILON);
        assert_eq!(point[0].weight, 1.0);
    }

    #[test]
    fn test_many_clusters_sum_to_one() {
        let mut table = InfluenceTable::new(1);
        for bone in 0..9u32 {
            table.add(0, bone, (bone + 1) as f32 * 0.37);
        }
        let packed = table.normalize(MAX_BONE_INFLUENCES, WEIGHT_EPSILON);
        let point = packed[0];
        assert_eq!(point.len(), 4);
        assert!((point.total_weight() - 1.0).abs() < 1e-6);
        assert_eq!(point.bones(), [8, 7, 6, 5]);
    }

    #[test]
    fn test_add_cluster_drops_bad_pairs() {
        let mut table = InfluenceTable::new(2);
        let section = table.extend(3);
        assert_eq!(section, 2..5);

        let dropped = table.add_cluster(section, 7, &[0, 2, 3, -1, 1], &[0.5, 1.0, 1.0, 1.0, -0.5]);
        assert_eq!(dropped, 3);
        assert_eq!(table.influences(2), &[BoneInfluence::new(7, 0.5)]);
        assert_eq!(table.influences(4), &[BoneInfluence::new(7, 1.0)]);
        assert!(table.influences(0).is_empty());
    }

    #[test]
    fn test_inline_storage() {
        let mut packed = BoneInfluences::new();
        for bone in 0..5 {
            packed.push(BoneInfluence::new(bone, 0.2));
        }
        assert_eq!(packed.len(), MAX_BONE_INFLUENCES);
        assert_eq!(BoneInfluences::root().weights(), [1.0, 0.0, 0.0, 0.0]);
    }
}
