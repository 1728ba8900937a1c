//! On-disk snapshot of the font registry, so that a directory scan does not
//! have to be repeated on every start.
//!
//! Only faces backed by files are written; application fonts held in memory
//! are registered again by their owners.

use std::fs;
use std::path::{Path, PathBuf};

use crate::db::{FamilyRecord, FontDatabase};
use crate::error::FontError;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RegistryManifest {
    pub version: u32,
    pub families: Vec<FamilyRecord>,
}

impl RegistryManifest {
    pub const CURRENT_VERSION: u32 = 1;
}

/// `<cache dir>/rust-fontresolve/registry.bin`, if the platform has a cache
/// directory.
pub fn default_snapshot_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("rust-fontresolve").join("registry.bin"))
}

impl FontDatabase {
    /// Builds the manifest for the current families, dropping in-memory
    /// sources (and styles / foundries / families left empty by that).
    pub fn snapshot(&self) -> RegistryManifest {
        let mut families = Vec::new();

        for family in self.families() {
            let mut family = family.clone();
            for foundry in family.foundries.iter_mut() {
                for style in foundry.styles.iter_mut() {
                    style.sizes.retain(|s| !s.source.is_memory());
                }
                foundry.styles.retain(|s| !s.sizes.is_empty());
            }
            family.foundries.retain(|f| !f.styles.is_empty());
            if !family.foundries.is_empty() {
                families.push(family);
            }
        }

        RegistryManifest {
            version: RegistryManifest::CURRENT_VERSION,
            families,
        }
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<(), FontError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let manifest = self.snapshot();
        let data = bincode::serialize(&manifest).map_err(|e| FontError::Snapshot(e.to_string()))?;
        fs::write(path, data)?;

        log::debug!(
            "wrote registry snapshot with {} families to {:?}",
            manifest.families.len(),
            path
        );
        Ok(())
    }

    /// Replaces all families with the snapshot at `path` and marks the
    /// database populated. Application fonts are registered on top.
    pub fn load_snapshot(&mut self, path: &Path) -> Result<(), FontError> {
        let data = fs::read(path)?;
        let manifest: RegistryManifest =
            bincode::deserialize(&data).map_err(|e| FontError::Snapshot(e.to_string()))?;

        if manifest.version != RegistryManifest::CURRENT_VERSION {
            return Err(FontError::SnapshotVersion {
                found: manifest.version,
                expected: RegistryManifest::CURRENT_VERSION,
            });
        }

        self.restore(manifest.families);
        log::debug!("loaded registry snapshot with {} families from {:?}", self.len(), path);
        Ok(())
    }

    /// Replaces all families, keeping the result sorted and unique.
    pub fn restore(&mut self, mut families: Vec<FamilyRecord>) {
        families.sort_by(|a, b| crate::db::compare_names(&a.name, &b.name));
        families.dedup_by(|a, b| crate::db::compare_names(&a.name, &b.name).is_eq());
        *self.families_mut() = families;
        self.mark_populated();
    }
}
