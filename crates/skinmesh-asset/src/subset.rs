//! Contiguous per-material ranges of the index buffer.

use log::warn;

use crate::source::MaterialMapping;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialSubset {
    pub material: usize,
    pub index_start: u32,
    pub index_count: u32,
}

impl MaterialSubset {
    pub fn new(material: usize, index_start: u32, index_count: u32) -> Self {
        Self {
            material,
            index_start,
            index_count,
        }
    }

    pub fn index_end(&self) -> u32 {
        self.index_start + self.index_count
    }
}

/// Opens a new subset whenever consecutive triangles change material.
#[derive(Debug)]
struct SubsetBuilder {
    subsets: Vec<MaterialSubset>,
    current: Option<usize>,
    start: u32,
    processed: u32,
}

impl SubsetBuilder {
    fn new(index_start: u32) -> Self {
        Self {
            subsets: Vec::new(),
            current: None,
            start: index_start,
            processed: index_start,
        }
    }

    fn close(&mut self) {
        if let Some(material) = self.current {
            let count = self.processed - self.start;
            if count > 0 {
                self.subsets
                    .push(MaterialSubset::new(material, self.start, count));
            }
        }
    }

    fn push_triangle(&mut self, material: usize) {
        if self.current != Some(material) {
            self.close();
            self.current = Some(material);
            self.start = self.processed;
        }
        self.processed += 3;
    }

    fn finish(mut self) -> Vec<MaterialSubset> {
        self.close();
        self.subsets
    }
}

/// Partition one mesh section of `polygon_count` triangles whose indices
/// begin at `index_start`. `material_for_slot` maps a polygon's material
/// slot to a material of the finished mesh, returning `None` when the slot
/// is not mapped.
pub fn partition_section(
    mapping: &MaterialMapping,
    polygon_count: usize,
    index_start: u32,
    material_for_slot: impl Fn(usize) -> Option<usize>,
) -> Vec<MaterialSubset> {
    let index_count = (polygon_count * 3) as u32;
    if polygon_count == 0 {
        return Vec::new();
    }
    match mapping {
        MaterialMapping::AllSame => {
            let material = material_for_slot(0).unwrap_or_else(|| {
                warn!("Material slot 0 is not mapped, using material 0");
                0
            });
            vec![MaterialSubset::new(material, index_start, index_count)]
        }
        MaterialMapping::ByPolygon(slots) if slots.len() == polygon_count => {
            let mut unmapped = 0usize;
            let mut builder = SubsetBuilder::new(index_start);
            for &slot in slots {
                let material = usize::try_from(slot).ok().and_then(&material_for_slot);
                builder.push_triangle(material.unwrap_or_else(|| {
                    unmapped += 1;
                    0
                }));
            }
            if unmapped > 0 {
                warn!("{} polygons use unmapped material slots, using material 0", unmapped);
            }
            builder.finish()
        }
        MaterialMapping::ByPolygon(slots) => {
            warn!(
                "Material mapping has {} entries for {} polygons, using a single subset",
                slots.len(),
                polygon_count
            );
            vec![MaterialSubset::new(0, index_start, index_count)]
        }
        MaterialMapping::Unsupported => {
            warn!("Unsupported material mapping, using a single subset");
            vec![MaterialSubset::new(0, index_start, index_count)]
        }
    }
}

/// Whether `subsets` tile `0..index_count` in order without gaps.
pub fn subsets_cover(subsets: &[MaterialSubset], index_count: usize) -> bool {
    let mut expected = 0u32;
    for subset in subsets {
        if subset.index_start != expected || subset.index_count == 0 {
            return false;
        }
        expected = subset.index_end();
    }
    expected as usize == index_count
}

/// Replace `subsets` with a single material 0 subset unless they tile the
/// whole index buffer.
pub fn validate_subsets(subsets: Vec<MaterialSubset>, index_count: usize) -> Vec<MaterialSubset> {
    if subsets_cover(&subsets, index_count) {
        return subsets;
    }
    let covered: u64 = subsets.iter().map(|subset| subset.index_count as u64).sum();
    warn!(
        "Material subsets cover {} of {} indices, falling back to a single subset",
        covered, index_count
    );
    if index_count == 0 {
        Vec::new()
    } else {
        vec![MaterialSubset::new(0, 0, index_count as u32)]
    }
}

#[cfg(test)]
mod test {
    use super::{partition_section, subsets_cover, validate_subsets, MaterialSubset};
    use crate::source::MaterialMapping;

    fn identity(slot: usize) -> Option<usize> {
        (slot < 3).then_some(slot)
    }

    #[test]
    fn test_two_materials() {
        let subsets = partition_section(&MaterialMapping::ByPolygon(vec![0, 1]), 2, 0, identity);
        assert_eq!(
            subsets,
            vec![MaterialSubset::new(0, 0, 3), MaterialSubset::new(1, 3, 3)]
        );
    }

    #[test]
    fn test_runs_merge() {
        let mapping = MaterialMapping::ByPolygon(vec![2, 2, 1, 1, 1, 2]);
        let subsets = partition_section(&mapping, 6, 12, identity);
        assert_eq!(
            subsets,
            vec![
                MaterialSubset::new(2, 12, 6),
                MaterialSubset::new(1, 18, 9),
                MaterialSubset::new(2, 27, 3),
            ]
        );
    }

    #[test]
    fn test_unmapped_slot_uses_zero() {
        let mapping = MaterialMapping::ByPolygon(vec![1, 9, -1]);
        let subsets = partition_section(&mapping, 3, 0, identity);
        assert_eq!(
            subsets,
            vec![MaterialSubset::new(1, 0, 3), MaterialSubset::new(0, 3, 6)]
        );
    }

    #[test]
    fn test_mismatched_mapping_falls_back() {
        let mapping = MaterialMapping::ByPolygon(vec![1]);
        let subsets = partition_section(&mapping, 4, 0, identity);
        assert_eq!(subsets, vec![MaterialSubset::new(0, 0, 12)]);

        let subsets = partition_section(&MaterialMapping::Unsupported, 2, 3, identity);
        assert_eq!(subsets, vec![MaterialSubset::new(0, 3, 6)]);
    }

    #[test]
    fn test_all_same() {
        let subsets = partition_section(&MaterialMapping::AllSame, 5, 0, |_| Some(2));
        assert_eq!(subsets, vec![MaterialSubset::new(2, 0, 15)]);
    }

    #[test]
    fn test_validate() {
        let good = vec![MaterialSubset::new(1, 0, 3), MaterialSubset::new(0, 3, 3)];
        assert!(subsets_cover(&good, 6));
        assert_eq!(validate_subsets(good.clone(), 6), good);

        let gap = vec![MaterialSubset::new(1, 0, 3), MaterialSubset::new(0, 6, 3)];
        assert!(!subsets_cover(&gap, 9));
        assert_eq!(validate_subsets(gap, 9), vec![MaterialSubset::new(0, 0, 9)]);

        let short = vec![MaterialSubset::new(1, 0, 3)];
        assert_eq!(validate_subsets(short, 6), vec![MaterialSubset::new(0, 0, 6)]);
    }
}
