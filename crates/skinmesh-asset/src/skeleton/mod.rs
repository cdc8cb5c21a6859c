use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
};

use glam::Mat4;
use log::warn;

mod hierarchy;
mod pose;

pub use hierarchy::build_skeleton;
pub use pose::SkeletonPose;

#[derive(Debug, Clone, PartialEq)]
pub enum SkeletonError {
    InvalidParent {
        bone: String,
        parent: usize,
        count: usize,
    },
    DuplicateBone(String),
    DegenerateBindPose(usize),
}

impl Display for SkeletonError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SkeletonError::InvalidParent {
                bone,
                parent,
                count,
            } => write!(
                f,
                "Bone {:?} refers to parent #{}, but only {} bones are registered",
                bone, parent, count
            ),
            SkeletonError::DuplicateBone(name) => write!(f, "Bone {:?} registered twice", name),
            SkeletonError::DegenerateBindPose(index) => {
                write!(f, "Bind pose of bone #{} is not invertible", index)
            }
        }
    }
}

impl std::error::Error for SkeletonError {}

#[derive(Debug, Clone)]
pub struct Bone {
    pub name: String,
    pub parent: Option<usize>,
    /// Global transform at bind time.
    pub bind_global: Mat4,
    /// Transform relative to the parent at bind time. Initial pose.
    ///
    /// A bone with a degenerate bind rests at its parent's transform, so
    /// this is identity for it and its children are measured from there.
    pub local_bind: Mat4,
    /// Mesh transform at bind time, as recorded by the bone's cluster.
    pub geometry_offset: Mat4,
    inverse_bind: Option<Mat4>,
    /// Inverse of the global transform this bone rests at in the bind pose.
    /// Always invertible, even when the bind itself is not.
    rest_inverse: Mat4,
}

impl Bone {
    /// Inverse of the bind global transform, `None` when it is singular.
    pub fn inverse_bind(&self) -> Option<Mat4> {
        self.inverse_bind
    }
}

fn invert(matrix: Mat4) -> Option<Mat4> {
    let determinant = matrix.determinant();
    if determinant == 0.0 || !determinant.is_finite() {
        return None;
    }
    let inverse = matrix.inverse();
    inverse.is_finite().then_some(inverse)
}

/// Bones stored in topological order: every parent precedes its children.
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    bones: Vec<Bone>,
    name_to_index: HashMap<String, usize>,
}

impl Skeleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bone after its parent. Returns the new bone index.
    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        parent: Option<usize>,
        bind_global: Mat4,
        geometry_offset: Mat4,
    ) -> Result<usize, SkeletonError> {
        let name = name.into();
        let index = self.bones.len();
        if let Some(parent) = parent {
            if parent >= index {
                return Err(SkeletonError::InvalidParent {
                    bone: name,
                    parent,
                    count: index,
                });
            }
        }
        if self.name_to_index.contains_key(&name) {
            return Err(SkeletonError::DuplicateBone(name));
        }

        let parent_rest_inverse =
            parent.map_or(Mat4::IDENTITY, |parent| self.bones[parent].rest_inverse);
        let inverse_bind = invert(bind_global);
        let (local_bind, rest_inverse) = match inverse_bind {
            Some(inverse_bind) => (parent_rest_inverse * bind_global, inverse_bind),
            None => {
                warn!(
                    "Bind pose of bone {:?} is degenerate, using identity skinning matrix",
                    name
                );
                (Mat4::IDENTITY, parent_rest_inverse)
            }
        };

        self.name_to_index.insert(name.clone(), index);
        self.bones.push(Bone {
            name,
            parent,
            bind_global,
            local_bind,
            geometry_offset,
            inverse_bind,
            rest_inverse,
        });
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(|(_, bone)| bone.parent.is_none())
            .map(|(index, _)| index)
    }

    /// `current_global * inverse(bind_global)` for the bone at `index`.
    pub fn skinning_matrix(&self, index: usize, current_global: Mat4) -> Result<Mat4, SkeletonError> {
        self.bones
            .get(index)
            .and_then(|bone| bone.inverse_bind)
            .map(|inverse_bind| current_global * inverse_bind)
            .ok_or(SkeletonError::DegenerateBindPose(index))
    }

    /// Pose with every bone at its bind transform.
    pub fn bind_pose(&self) -> SkeletonPose {
        let mut pose = SkeletonPose::from_locals(self.bones.iter().map(|bone| bone.local_bind));
        self.resolve_pose(&mut pose);
        pose
    }

    /// Compute the global transform of one bone from its pose local and
    /// its parent's global. The parent must already be resolved in `pose`.
    pub fn resolve_global_transform(&self, pose: &mut SkeletonPose, index: usize) -> Mat4 {
        let local = pose.local[index];
        let global = match self.bones[index].parent {
            Some(parent) => pose.global[parent] * local,
            None => local,
        };
        pose.global[index] = global;
        global
    }

    /// Forward pass over all bones, refreshing global and skinning matrices.
    pub fn resolve_pose(&self, pose: &mut SkeletonPose) {
        pose.resize(self.bones.len(), |index| self.bones[index].local_bind);
        for index in 0..self.bones.len() {
            let global = self.resolve_global_transform(pose, index);
            pose.skinning[index] = self
                .skinning_matrix(index, global)
                .unwrap_or(Mat4::IDENTITY);
        }
    }
}

#[cfg(test)]
mod test {
    use glam::{Mat4, Quat, Vec3};

    use super::{Skeleton, SkeletonError};

    fn chain() -> Skeleton {
        let mut skeleton = Skeleton::new();
        let root = Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0));
        let child = root * Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0));
        let tip = child * Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0));
        let root = skeleton.add_bone("root", None, root, Mat4::IDENTITY).unwrap();
        let child = skeleton
            .add_bone("child", Some(root), child, Mat4::IDENTITY)
            .unwrap();
        skeleton
            .add_bone("tip", Some(child), tip, Mat4::IDENTITY)
            .unwrap();
        skeleton
    }

    #[test]
    fn test_add_bone_rejects_forward_parent() {
        let mut skeleton = Skeleton::new();
        skeleton
            .add_bone("root", None, Mat4::IDENTITY, Mat4::IDENTITY)
            .unwrap();
        let result = skeleton.add_bone("bad", Some(1), Mat4::IDENTITY, Mat4::IDENTITY);
        assert_eq!(
            result,
            Err(SkeletonError::InvalidParent {
                bone: String::from("bad"),
                parent: 1,
                count: 1
            })
        );
        assert_eq!(skeleton.len(), 1);
    }

    #[test]
    fn test_add_bone_rejects_duplicate() {
        let mut skeleton = Skeleton::new();
        skeleton
            .add_bone("root", None, Mat4::IDENTITY, Mat4::IDENTITY)
            .unwrap();
        let result = skeleton.add_bone("root", None, Mat4::IDENTITY, Mat4::IDENTITY);
        assert!(matches!(result, Err(SkeletonError::DuplicateBone(_))));
    }

    #[test]
    fn test_parents_precede_children() {
        let skeleton = chain();
        for (index, bone) in skeleton.bones().iter().enumerate() {
            if let Some(parent) = bone.parent {
                assert!(parent < index);
            }
        }
        assert_eq!(skeleton.roots().collect::<Vec<_>>(), vec![0]);
        assert_eq!(skeleton.find_bone("tip"), Some(2));
    }

    #[test]
    fn test_bind_pose_reproduces_bind_globals() {
        let skeleton = chain();
        let pose = skeleton.bind_pose();
        for (index, bone) in skeleton.bones().iter().enumerate() {
            assert!(pose.global[index].abs_diff_eq(bone.bind_global, 1e-5));
            assert!(pose.skinning[index].abs_diff_eq(Mat4::IDENTITY, 1e-5));
        }
    }

    #[test]
    fn test_rotation_propagates_to_children() {
        let skeleton = chain();
        let mut pose = skeleton.bind_pose();
        pose.local[0] = pose.local[0] * Mat4::from_quat(Quat::from_rotation_z(90f32.to_radians()));
        skeleton.resolve_pose(&mut pose);

        // Tip sat at y = 3 in bind pose; the chain now points along -x from (0, 1, 0).
        let tip = pose.global[2].transform_point3(Vec3::ZERO);
        assert!(tip.abs_diff_eq(Vec3::new(-2.0, 1.0, 0.0), 1e-5));
    }

    #[test]
    fn test_degenerate_bind_pose() {
        let mut skeleton = Skeleton::new();
        let index = skeleton
            .add_bone("flat", None, Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0)), Mat4::IDENTITY)
            .unwrap();
        assert_eq!(
            skeleton.skinning_matrix(index, Mat4::IDENTITY),
            Err(SkeletonError::DegenerateBindPose(index))
        );

        let pose = skeleton.bind_pose();
        assert_eq!(pose.skinning[index], Mat4::IDENTITY);
    }

    #[test]
    fn test_child_of_degenerate_bone_rests_at_bind() {
        let mut skeleton = Skeleton::new();
        let root = Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0));
        let root = skeleton.add_bone("root", None, root, Mat4::IDENTITY).unwrap();
        let flat = skeleton
            .add_bone(
                "flat",
                Some(root),
                Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0)),
                Mat4::IDENTITY,
            )
            .unwrap();
        let child_bind = Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0));
        let child = skeleton
            .add_bone("child", Some(flat), child_bind, Mat4::IDENTITY)
            .unwrap();
        let grandchild_bind = Mat4::from_translation(Vec3::new(1.0, 2.0, 0.0));
        let grandchild = skeleton
            .add_bone("grandchild", Some(child), grandchild_bind, Mat4::IDENTITY)
            .unwrap();

        let pose = skeleton.bind_pose();
        for index in [root, flat, child, grandchild] {
            assert!(pose.skinning[index].abs_diff_eq(Mat4::IDENTITY, 1e-6));
        }
        assert!(pose.global[child].abs_diff_eq(child_bind, 1e-6));
        assert!(pose.global[grandchild].abs_diff_eq(grandchild_bind, 1e-6));
        // The degenerate bone rests where its parent is.
        assert!(pose.global[flat].abs_diff_eq(pose.global[root], 1e-6));

        let vertex = Vec3::new(0.0, 2.0, 0.0);
        assert!(pose.skinning[child]
            .transform_point3(vertex)
            .abs_diff_eq(vertex, 1e-6));
    }

    #[test]
    fn test_degenerate_root_with_children() {
        let mut skeleton = Skeleton::new();
        let flat = skeleton
            .add_bone("flat", None, Mat4::ZERO, Mat4::IDENTITY)
            .unwrap();
        let bind = Mat4::from_translation(Vec3::new(0.0, 0.0, 3.0));
        let child = skeleton
            .add_bone("child", Some(flat), bind, Mat4::IDENTITY)
            .unwrap();

        let mut pose = skeleton.bind_pose();
        assert_eq!(pose.global[flat], Mat4::IDENTITY);
        assert!(pose.global[child].abs_diff_eq(bind, 1e-6));
        assert!(pose.skinning[child].abs_diff_eq(Mat4::IDENTITY, 1e-6));

        // Moving the degenerate bone still carries its children along.
        pose.local[flat] = Mat4::from_translation(Vec3::X);
        skeleton.resolve_pose(&mut pose);
        assert!(pose.skinning[child]
            .transform_point3(Vec3::ZERO)
            .abs_diff_eq(Vec3::X, 1e-6));
    }
}
