use std::{
    fmt::{self, Display, Formatter},
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
};

use super::{RawScene, SceneSource};

#[derive(Debug)]
pub enum JsonSourceError {
    Io(io::Error),
    Json(serde_json::Error),
}

impl Display for JsonSourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            JsonSourceError::Io(err) => Display::fmt(err, f),
            JsonSourceError::Json(err) => write!(f, "Bad scene description: {}", err),
        }
    }
}

impl std::error::Error for JsonSourceError {}

impl From<io::Error> for JsonSourceError {
    fn from(value: io::Error) -> Self {
        JsonSourceError::Io(value)
    }
}

impl From<serde_json::Error> for JsonSourceError {
    fn from(value: serde_json::Error) -> Self {
        JsonSourceError::Json(value)
    }
}

/// Reads scenes serialized as JSON from a directory tree.
///
/// Relative paths are resolved against `root`. When a scene carries no
/// `directory` of its own, the parent of its file is filled in so texture
/// paths resolve next to the scene.
#[derive(Debug, Clone)]
pub struct JsonSceneSource {
    root: PathBuf,
}

impl JsonSceneSource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SceneSource for JsonSceneSource {
    type Error = JsonSourceError;

    fn read_scene(&mut self, path: &Path) -> Result<Option<RawScene>, Self::Error> {
        let full_path = self.root.join(path);
        let file = match File::open(&full_path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut scene: RawScene = serde_json::from_reader(BufReader::new(file))?;
        if scene.directory.is_none() {
            scene.directory = full_path
                .parent()
                .map(|parent| parent.to_string_lossy().replace('\\', "/"));
        }
        Ok(Some(scene))
    }
}
