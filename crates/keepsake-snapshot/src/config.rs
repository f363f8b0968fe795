use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Process-wide snapshot settings.
///
/// Missing keys take their default, so an empty document is a valid config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Snapshot embedded and serialized references as nested snapshots.
    /// When off, such fields are left out.
    pub cache_embedded: bool,
    /// Deep-copy arrays of plain values instead of sharing them.
    pub copy_value_arrays: bool,
    /// Stop embedded recursion when it reaches an instance already on the
    /// current path.
    pub detect_embedding_cycles: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            cache_embedded: true,
            copy_value_arrays: false,
            detect_embedding_cycles: true,
        }
    }
}

impl SnapshotConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let c = SnapshotConfig::default();
        assert!(c.cache_embedded);
        assert!(!c.copy_value_arrays);
        assert!(c.detect_embedding_cycles);
    }

    #[test]
    fn missing_keys_use_defaults() {
        let c = SnapshotConfig::from_toml_str("copy_value_arrays = true\n").unwrap();
        assert!(c.copy_value_arrays);
        assert!(c.cache_embedded);
        assert_eq!(SnapshotConfig::from_toml_str("").unwrap(), SnapshotConfig::default());
    }

    #[test]
    fn rejects_wrong_types() {
        let err = SnapshotConfig::from_toml_str("cache_embedded = \"yes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cache_embedded = false").unwrap();
        writeln!(file, "detect_embedding_cycles = false").unwrap();
        let c = SnapshotConfig::load(file.path()).unwrap();
        assert!(!c.cache_embedded);
        assert!(!c.detect_embedding_cycles);
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SnapshotConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
