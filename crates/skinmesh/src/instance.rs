use std::sync::Arc;

use glam::{Mat4, Vec3};
use log::{trace, warn};
use skinmesh_asset::{mesh::SkeletalMeshAsset, skeleton::SkeletonPose};

use crate::skinning::skin_vertices;

/// Whether the cached buffers match the current pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkinState {
    Clean,
    #[default]
    Dirty,
}

/// One animated copy of a shared mesh.
///
/// The pose and the skinned buffers belong to the instance, so several
/// instances can animate the same [`SkeletalMeshAsset`] independently.
#[derive(Debug, Clone)]
pub struct SkinnedMeshInstance {
    mesh: Arc<SkeletalMeshAsset>,
    pose: SkeletonPose,
    state: SkinState,
    skin_normals: bool,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
}

impl SkinnedMeshInstance {
    pub fn new(mesh: Arc<SkeletalMeshAsset>) -> Self {
        let pose = mesh.skeleton.bind_pose();
        let positions = mesh.vertices.iter().map(|vertex| vertex.position()).collect();
        let normals = mesh.vertices.iter().map(|vertex| vertex.normal()).collect();
        Self {
            mesh,
            pose,
            state: SkinState::Dirty,
            skin_normals: true,
            positions,
            normals,
        }
    }

    /// Skip normals during [`Self::update`]. They then stay at the bind normals.
    pub fn without_normals(mut self) -> Self {
        self.skin_normals = false;
        self.normals = self.mesh.vertices.iter().map(|vertex| vertex.normal()).collect();
        self
    }

    pub fn mesh(&self) -> &Arc<SkeletalMeshAsset> {
        &self.mesh
    }

    pub fn pose(&self) -> &SkeletonPose {
        &self.pose
    }

    pub fn state(&self) -> SkinState {
        self.state
    }

    fn invalidate(&mut self) {
        if self.state == SkinState::Clean {
            trace!("Skinned mesh {:?} invalidated", self.mesh.name);
            self.state = SkinState::Dirty;
        }
    }

    /// Replace the local transform of one bone. Returns `false` if the bone
    /// does not exist.
    pub fn set_local_transform(&mut self, bone: usize, local: Mat4) -> bool {
        let Some(slot) = self.pose.local.get_mut(bone) else {
            warn!("Bone #{} not found in skinned mesh {:?}", bone, self.mesh.name);
            return false;
        };
        *slot = local;
        self.invalidate();
        true
    }

    /// Replace the local transforms of all bones at once. Extra entries are
    /// ignored, missing ones keep their current transform.
    pub fn set_pose(&mut self, locals: &[Mat4]) {
        if locals.len() != self.pose.local.len() {
            warn!(
                "Pose has {} transforms for {} bones in skinned mesh {:?}",
                locals.len(),
                self.pose.local.len(),
                self.mesh.name
            );
        }
        for (slot, local) in self.pose.local.iter_mut().zip(locals) {
            *slot = *local;
        }
        self.invalidate();
    }

    /// Return every bone to its bind transform.
    pub fn reset_pose(&mut self) {
        for (slot, bone) in self.pose.local.iter_mut().zip(self.mesh.skeleton.bones()) {
            *slot = bone.local_bind;
        }
        self.invalidate();
    }

    /// Re-skin if the pose changed since the last call. Returns whether any
    /// work was done.
    pub fn update(&mut self) -> bool {
        if self.state == SkinState::Clean {
            return false;
        }
        self.mesh.skeleton.resolve_pose(&mut self.pose);
        let normals = self.skin_normals.then_some(self.normals.as_mut_slice());
        skin_vertices(
            &self.mesh.vertices,
            &self.pose.skinning,
            &mut self.positions,
            normals,
        );
        self.state = SkinState::Clean;
        true
    }

    /// Skinned positions as of the last [`Self::update`], in vertex order.
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// Global transform of the named bone as of the last [`Self::update`].
    pub fn bone_global(&self, name: &str) -> Option<Mat4> {
        let index = self.mesh.skeleton.find_bone(name)?;
        self.pose.global.get(index).copied()
    }
}
