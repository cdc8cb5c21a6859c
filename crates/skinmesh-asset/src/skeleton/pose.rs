use glam::Mat4;

/// Per-frame transforms of a skeleton, one slot per bone.
///
/// The bind data in [`super::Skeleton`] never changes; a pose is what an
/// animation writes into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkeletonPose {
    pub local: Vec<Mat4>,
    pub global: Vec<Mat4>,
    pub skinning: Vec<Mat4>,
}

impl SkeletonPose {
    pub fn from_locals(locals: impl IntoIterator<Item = Mat4>) -> Self {
        let local: Vec<Mat4> = locals.into_iter().collect();
        let count = local.len();
        Self {
            local,
            global: vec![Mat4::IDENTITY; count],
            skinning: vec![Mat4::IDENTITY; count],
        }
    }

    pub fn len(&self) -> usize {
        self.local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    pub(crate) fn resize(&mut self, count: usize, default_local: impl Fn(usize) -> Mat4) {
        if self.local.len() != count {
            let current = self.local.len().min(count);
            self.local.truncate(current);
            self.local.extend((current..count).map(default_local));
        }
        self.global.resize(count, Mat4::IDENTITY);
        self.skinning.resize(count, Mat4::IDENTITY);
    }
}
