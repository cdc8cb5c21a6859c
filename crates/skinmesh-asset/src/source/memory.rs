use std::{
    collections::HashMap,
    convert::Infallible,
    path::{Path, PathBuf},
};

use super::{RawScene, SceneSource};

/// Scene source backed by scenes already held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySceneSource {
    scenes: HashMap<PathBuf, RawScene>,
}

impl MemorySceneSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<P: Into<PathBuf>>(&mut self, path: P, scene: RawScene) -> Option<RawScene> {
        self.scenes.insert(path.into(), scene)
    }

    pub fn with_scene<P: Into<PathBuf>>(mut self, path: P, scene: RawScene) -> Self {
        self.insert(path, scene);
        self
    }
}

impl SceneSource for MemorySceneSource {
    type Error = Infallible;

    fn read_scene(&mut self, path: &Path) -> Result<Option<RawScene>, Self::Error> {
        Ok(self.scenes.get(path).cloned())
    }
}
