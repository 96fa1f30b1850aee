//! Region persistence.
//!
//! [`RegionStore`] is the load/save seam the engine sees. [`JsonRegionStore`]
//! keeps one world's regions in a versioned JSON document, written with the
//! temp file + rename pattern so a crash never leaves a half-written file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{RegionError, StoreError};
use crate::index::RegionIndex;
use crate::region::Region;

const FORMAT_VERSION: u32 = 1;

/// Load/save of one world's region set.
pub trait RegionStore: Send + Sync {
    fn load(&self) -> Result<Vec<Region>, StoreError>;
    fn save(&self, regions: &[Arc<Region>]) -> Result<(), StoreError>;
}

#[derive(Deserialize)]
struct Document {
    version: u32,
    #[serde(default)]
    regions: Vec<Region>,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    version: u32,
    regions: Vec<&'a Region>,
}

/// Regions as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonRegionStore {
    path: PathBuf,
}

impl JsonRegionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load into `index`, replacing its contents. A missing file loads as
    /// an empty set.
    pub fn load_into(&self, index: &RegionIndex) -> Result<usize, StoreError> {
        let regions = self.load()?;
        let count = regions.len();
        index.replace_all(regions).map_err(|source| self.invalid(source))?;
        Ok(count)
    }

    fn invalid(&self, source: RegionError) -> StoreError {
        StoreError::Invalid {
            path: self.path.clone(),
            source,
        }
    }

    fn write_atomic(&self, bytes: &[u8]) -> io::Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }
}

impl RegionStore for JsonRegionStore {
    fn load(&self) -> Result<Vec<Region>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No region file yet");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let document: Document =
            serde_json::from_str(&raw).map_err(|source| StoreError::Format {
                path: self.path.clone(),
                source,
            })?;
        if document.version != FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                path: self.path.clone(),
                version: document.version,
            });
        }
        for region in &document.regions {
            region
                .validate()
                .map_err(|err| self.invalid(RegionError::from(err)))?;
        }
        tracing::info!(path = %self.path.display(), count = document.regions.len(), "Loaded regions");
        Ok(document.regions)
    }

    fn save(&self, regions: &[Arc<Region>]) -> Result<(), StoreError> {
        let document = DocumentRef {
            version: FORMAT_VERSION,
            regions: regions.iter().map(AsRef::as_ref).collect(),
        };
        let bytes = serde_json::to_vec_pretty(&document).map_err(|source| StoreError::Format {
            path: self.path.clone(),
            source,
        })?;
        self.write_atomic(&bytes).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(path = %self.path.display(), count = regions.len(), "Saved regions");
        Ok(())
    }
}
