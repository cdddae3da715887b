use crate::model::{Campaign, Collection};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Schema version this build reads and writes.
pub const INDEX_SCHEMA_VERSION: &str = "2.0";

/// Why an index document could not be loaded or accepted.
#[derive(Debug, Error)]
pub enum IndexError {
	#[error("cannot read index file: {0}")]
	Io(#[from] std::io::Error),

	#[error("cannot parse index document: {0}")]
	Parse(#[from] serde_json::Error),

	#[error("unsupported index schema version '{found}' (this build supports '{INDEX_SCHEMA_VERSION}')")]
	SchemaMismatch { found: String },

	#[error("index failed structural validation: {}", problems.join("; "))]
	Structural { problems: Vec<String> },

	#[error("index file is locked: {0}")]
	Locked(String),
}

/// The persisted three-level spatial index document.
///
/// Serving code treats a loaded index as immutable; only the builder
/// produces new documents, which replace the old file atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialIndex {
	pub schema_version: String,
	pub generated_at: DateTime<Utc>,
	pub bucket: String,
	pub total_tile_count: u64,
	pub collections: Vec<Collection>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_incremental_update: Option<DateTime<Utc>>,
}

impl SpatialIndex {
	#[must_use]
	pub fn new(bucket: &str) -> SpatialIndex {
		SpatialIndex {
			schema_version: INDEX_SCHEMA_VERSION.to_string(),
			generated_at: Utc::now(),
			bucket: bucket.to_string(),
			total_tile_count: 0,
			collections: Vec::new(),
			last_incremental_update: None,
		}
	}

	/// Recomputes every derived field bottom-up: campaign bounds and
	/// counts, then the total tile count.
	pub fn recompute(&mut self) -> Result<()> {
		for collection in &mut self.collections {
			collection.recompute()?;
		}
		self.total_tile_count = self.collections.iter().map(Collection::tile_count).sum();
		Ok(())
	}

	/// Iterates `(collection index, campaign id, campaign)` over the
	/// whole corpus.
	pub fn campaigns(&self) -> impl Iterator<Item = (usize, &str, &Campaign)> {
		self
			.collections
			.iter()
			.enumerate()
			.flat_map(|(i, c)| c.campaigns.iter().map(move |(id, campaign)| (i, id.as_str(), campaign)))
	}

	/// Looks up a campaign by id across collections.
	#[must_use]
	pub fn campaign(&self, id: &str) -> Option<(&Collection, &Campaign)> {
		self
			.collections
			.iter()
			.find_map(|c| c.campaigns.get(id).map(|campaign| (c, campaign)))
	}

	/// Set of all tile keys. Used by resume and incremental update to
	/// subtract already-extracted objects.
	#[must_use]
	pub fn tile_keys(&self) -> std::collections::HashSet<String> {
		self
			.campaigns()
			.flat_map(|(_, _, c)| c.files.iter().map(|t| t.key.clone()))
			.collect()
	}

	/// Parses a document, accepting only the supported schema version.
	pub fn from_json(json: &str) -> Result<SpatialIndex, IndexError> {
		// Probe the version before full deserialization so a mismatch is
		// reported as such rather than as an arbitrary parse error.
		#[derive(Deserialize)]
		struct VersionProbe {
			schema_version: String,
		}
		let probe: VersionProbe = serde_json::from_str(json)?;
		if probe.schema_version != INDEX_SCHEMA_VERSION {
			return Err(IndexError::SchemaMismatch {
				found: probe.schema_version,
			});
		}
		Ok(serde_json::from_str(json)?)
	}

	pub fn load(path: &Path) -> Result<SpatialIndex, IndexError> {
		let text = fs::read_to_string(path)?;
		Self::from_json(&text)
	}

	/// Loads and enforces the structural invariants. This is the startup
	/// entry point: a serving process must not come up on a broken index.
	pub fn load_validated(path: &Path) -> Result<SpatialIndex, IndexError> {
		let index = Self::load(path)?;
		let report = crate::index::validate(&index);
		if report.is_ok() {
			Ok(index)
		} else {
			Err(IndexError::Structural {
				problems: report.problems,
			})
		}
	}

	/// Writes the document under a lock file, then atomically replaces
	/// `path` via rename so concurrent readers never observe a torn file.
	pub fn save_atomic(&self, path: &Path) -> Result<()> {
		let _lock = FileLock::acquire(path)?;
		let tmp = path.with_extension("json.tmp");
		let text = serde_json::to_string_pretty(self).context("serializing index")?;
		fs::write(&tmp, text).with_context(|| format!("writing {}", tmp.display()))?;
		fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
		Ok(())
	}
}

/// Advisory lock guarding index writes. Only the builder takes it;
/// readers never need one because replacement is atomic.
struct FileLock {
	path: PathBuf,
}

impl FileLock {
	fn acquire(target: &Path) -> Result<FileLock> {
		let path = target.with_extension("json.lock");
		match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
			Ok(_) => Ok(FileLock { path }),
			Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
				Err(IndexError::Locked(path.display().to_string()).into())
			}
			Err(e) => Err(e).with_context(|| format!("creating lock file {}", path.display())),
		}
	}
}

impl Drop for FileLock {
	fn drop(&mut self) {
		if let Err(e) = fs::remove_file(&self.path) {
			log::warn!("could not remove lock file {}: {e}", self.path.display());
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn new_index_has_supported_schema() {
		let index = SpatialIndex::new("test-bucket");
		assert_eq!(index.schema_version, INDEX_SCHEMA_VERSION);
		assert_eq!(index.total_tile_count, 0);
	}

	#[test]
	fn schema_mismatch_is_detected() {
		let json = r#"{"schema_version":"1.0","generated_at":"2024-01-01T00:00:00Z","bucket":"b","total_tile_count":0,"collections":[]}"#;
		match SpatialIndex::from_json(json) {
			Err(IndexError::SchemaMismatch { found }) => assert_eq!(found, "1.0"),
			other => panic!("expected schema mismatch, got {other:?}"),
		}
	}

	#[test]
	fn json_round_trip_is_identity() {
		let mut index = SpatialIndex::new("bucket");
		index.generated_at = "2024-06-01T12:00:00Z".parse().unwrap();
		let text = serde_json::to_string(&index).unwrap();
		let back = SpatialIndex::from_json(&text).unwrap();
		assert_eq!(index, back);
		// Re-serializing yields identical bytes.
		assert_eq!(text, serde_json::to_string(&back).unwrap());
	}

	#[test]
	fn save_is_atomic_and_reloadable() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("index.json");
		let index = SpatialIndex::new("bucket");
		index.save_atomic(&path).unwrap();
		assert!(path.exists());
		assert!(!path.with_extension("json.tmp").exists());
		assert!(!path.with_extension("json.lock").exists());
		let back = SpatialIndex::load(&path).unwrap();
		assert_eq!(back.bucket, "bucket");
	}

	#[test]
	fn concurrent_lock_is_refused() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("index.json");
		let _held = FileLock::acquire(&path).unwrap();
		let err = SpatialIndex::new("b").save_atomic(&path).unwrap_err();
		assert!(err.to_string().contains("locked"), "got: {err:#}");
	}
}
