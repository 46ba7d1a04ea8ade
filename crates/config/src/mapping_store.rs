use std::fs;
use std::path::{Path, PathBuf};

use benchgrid_recon::{MappingStore, MappingTable, ReconError};
use tracing::{debug, warn};

/// Mapping cache on disk: one pretty-printed JSON file per key under
/// `<config dir>/benchgrid/mappings/`.
#[derive(Debug, Clone)]
pub struct FileMappingStore {
    root: PathBuf,
}

impl FileMappingStore {
    pub fn new() -> Self {
        Self::with_root(Self::default_root())
    }

    /// Store rooted somewhere other than the user config directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn default_root() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("benchgrid")
            .join("mappings")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("{}.json", file))
    }

    /// Delete the entry for `key`. Returns whether anything was removed.
    pub fn remove(&self, key: &str) -> Result<bool, ReconError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ReconError::Io(format!("{}: {}", path.display(), e))),
        }
    }
}

impl Default for FileMappingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MappingStore for FileMappingStore {
    fn load(&self, key: &str) -> Option<MappingTable> {
        let path = self.path_for(key);
        let data = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&data) {
            Ok(mapping) => {
                debug!(path = %path.display(), "cached mapping loaded");
                Some(mapping)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable cached mapping");
                None
            }
        }
    }

    fn save(&self, key: &str, mapping: &MappingTable) -> Result<(), ReconError> {
        let path = self.path_for(key);
        let io_err = |e: std::io::Error| ReconError::Io(format!("{}: {}", path.display(), e));
        fs::create_dir_all(&self.root).map_err(io_err)?;
        let json = serde_json::to_string_pretty(mapping).map_err(|e| ReconError::Io(e.to_string()))?;
        fs::write(&path, json).map_err(io_err)?;
        debug!(path = %path.display(), rows = mapping.len(), "mapping cached");
        Ok(())
    }
}
