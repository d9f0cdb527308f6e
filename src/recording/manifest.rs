//! Recording session manifest
//!
//! JSON metadata written alongside exported tracks. Updates merge new
//! recorder ids into whatever is already on disk; prior entries are never
//! disturbed.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Current manifest format version
pub const MANIFEST_VERSION: &str = "1";

/// One recorded track's metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderEntry {
    /// Recordee display name at handshake time
    pub name: String,

    /// Capture sample rate in Hz
    pub sample_rate: u32,
}

/// Versioned manifest of a recording session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingManifest {
    /// Format version
    pub version: String,

    /// Recorder id → track metadata
    pub recorders: BTreeMap<String, RecorderEntry>,
}

impl Default for RecordingManifest {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingManifest {
    /// Create an empty manifest at the current version
    pub fn new() -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            recorders: BTreeMap::new(),
        }
    }

    /// Add or update one recorder entry, leaving all others untouched
    pub fn merge(&mut self, id: impl Into<String>, entry: RecorderEntry) {
        self.recorders.insert(id.into(), entry);
    }

    /// Load a manifest, or start a fresh one if the file does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data)
            .map_err(|e| Error::SerializationError(format!("Bad manifest {}: {}", path.display(), e)))
    }

    /// Persist the manifest as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::SerializationError(format!("Failed to serialize manifest: {}", e)))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load-merge-save a single entry without disturbing prior ones
    pub fn merge_into_file(
        path: impl AsRef<Path>,
        id: impl Into<String>,
        entry: RecorderEntry,
    ) -> Result<Self> {
        let path = path.as_ref();
        let mut manifest = Self::load(path)?;
        manifest.merge(id, entry);
        manifest.save(path)?;
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, sample_rate: u32) -> RecorderEntry {
        RecorderEntry {
            name: name.to_string(),
            sample_rate,
        }
    }

    #[test]
    fn test_new_manifest_version() {
        let manifest = RecordingManifest::new();
        assert_eq!(manifest.version, "1");
        assert!(manifest.recorders.is_empty());
    }

    #[test]
    fn test_wire_format() {
        let mut manifest = RecordingManifest::new();
        manifest.merge("s1", entry("ada", 44100));

        let json = serde_json::to_string(&manifest).unwrap();
        assert_eq!(
            json,
            r#"{"version":"1","recorders":{"s1":{"name":"ada","sampleRate":44100}}}"#
        );
    }

    #[test]
    fn test_merge_preserves_prior_entries() {
        let mut manifest = RecordingManifest::new();
        manifest.merge("s1", entry("ada", 44100));
        manifest.merge("s2", entry("grace", 48000));
        manifest.merge("s1", entry("ada lovelace", 44100));

        assert_eq!(manifest.recorders.len(), 2);
        assert_eq!(manifest.recorders["s1"].name, "ada lovelace");
        assert_eq!(manifest.recorders["s2"].name, "grace");
    }

    #[test]
    fn test_load_missing_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");

        let manifest = RecordingManifest::load(&path).unwrap();
        assert_eq!(manifest, RecordingManifest::new());
    }

    #[test]
    fn test_incremental_merge_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");

        RecordingManifest::merge_into_file(&path, "s1", entry("ada", 44100)).unwrap();
        let merged = RecordingManifest::merge_into_file(&path, "s2", entry("grace", 48000)).unwrap();

        assert_eq!(merged.recorders.len(), 2);

        let reloaded = RecordingManifest::load(&path).unwrap();
        assert_eq!(reloaded, merged);
        assert_eq!(reloaded.recorders["s1"].sample_rate, 44100);
    }

    #[test]
    fn test_bad_manifest_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(RecordingManifest::load(&path).is_err());
    }
}
