use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use log::debug;

use crate::{mesh::SkeletalMeshAsset, source::SceneSource};

use super::{load_scene, ImportParams, LoadError};

type Slot = Arc<Mutex<Option<Arc<SkeletalMeshAsset>>>>;

/// Shares finished meshes by path.
///
/// Each path is imported at most once while it succeeds. Callers racing on
/// the same path wait for the first import and then receive its result.
/// Failed imports are not remembered.
#[derive(Debug, Default)]
pub struct MeshCache {
    slots: Mutex<HashMap<PathBuf, Slot>>,
}

impl MeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, path: &Path) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(path.to_path_buf()).or_default().clone()
    }

    /// The mesh cached for `path`, if one has finished loading.
    pub fn get(&self, path: &Path) -> Option<Arc<SkeletalMeshAsset>> {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.get(path)?.clone()
        };
        let mesh = slot.lock().unwrap_or_else(PoisonError::into_inner);
        mesh.clone()
    }

    pub fn load<S: SceneSource>(
        &self,
        source: &mut S,
        path: &Path,
        params: &ImportParams,
    ) -> Result<Arc<SkeletalMeshAsset>, LoadError<S::Error>> {
        let slot = self.slot(path);
        let mut mesh = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mesh) = mesh.as_ref() {
            debug!("Mesh cache hit for {}", path.display());
            return Ok(mesh.clone());
        }
        match load_scene(source, path, params) {
            Ok(loaded) => {
                let loaded = Arc::new(loaded);
                *mesh = Some(loaded.clone());
                Ok(loaded)
            }
            Err(err) => {
                drop(mesh);
                self.release(path, slot);
                Err(err)
            }
        }
    }

    /// Forget the empty slot of a failed load unless another caller is
    /// already waiting on it.
    fn release(&self, path: &Path, slot: Slot) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = slots
            .get(path)
            .is_some_and(|current| Arc::ptr_eq(current, &slot) && Arc::strong_count(&slot) == 2);
        if idle {
            slots.remove(path);
        }
    }

    /// Number of paths with a finished mesh.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .values()
            .filter(|slot| {
                slot.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_some()
            })
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
