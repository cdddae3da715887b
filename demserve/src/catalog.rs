//! The source catalog: every elevation source the engine may consult,
//! loaded from a JSON configuration document at startup.
//!
//! Descriptors are strict: a document missing any required field is
//! rejected before the server comes up, so downstream code never probes
//! for optional shapes.

use anyhow::{Context, Result, bail, ensure};
use demserve_core::{Bounds, Crs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// Kind of elevation source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
	#[serde(rename = "object-storage")]
	ObjectStorage,
	#[serde(rename = "http-api")]
	HttpApi,
}

/// One configured elevation source. All fields are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceDescriptor {
	pub id: String,
	#[serde(rename = "type")]
	pub kind: SourceKind,
	/// Bucket URI (`s3://...`, `file://...`, `memory:`) for object
	/// storage, endpoint URL for HTTP APIs.
	pub path: String,
	pub crs: Crs,
	pub resolution_m: f64,
	pub bounds: Bounds,
	/// Lower value is consulted first among equals.
	pub priority: u32,
	pub cost_per_query: f64,
	pub enabled: bool,
	/// Free-form per-source settings: `country` for object storage,
	/// `style` / `api_key_env` / `daily_quota` / `per_second` for HTTP
	/// providers.
	pub metadata: BTreeMap<String, serde_json::Value>,
}

impl SourceDescriptor {
	fn check(&self) -> Result<()> {
		ensure!(!self.id.is_empty(), "source with empty id");
		ensure!(!self.path.is_empty(), "source '{}' has an empty path", self.id);
		self
			.bounds
			.validate()
			.with_context(|| format!("source '{}' has invalid bounds", self.id))?;
		ensure!(
			self.resolution_m > 0.0,
			"source '{}' has non-positive resolution",
			self.id
		);
		ensure!(
			self.cost_per_query >= 0.0,
			"source '{}' has negative cost_per_query",
			self.id
		);
		Ok(())
	}

	/// String metadata value, if present.
	#[must_use]
	pub fn meta_str(&self, key: &str) -> Option<&str> {
		self.metadata.get(key).and_then(|v| v.as_str())
	}

	/// Unsigned metadata value, if present.
	#[must_use]
	pub fn meta_u64(&self, key: &str) -> Option<u64> {
		self.metadata.get(key).and_then(serde_json::Value::as_u64)
	}
}

/// The full catalog document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceCatalog {
	pub schema_version: String,
	pub last_updated: chrono::DateTime<chrono::Utc>,
	pub elevation_sources: Vec<SourceDescriptor>,
}

impl SourceCatalog {
	/// Parse from any reader and enforce catalog-level invariants.
	pub fn from_reader<R: Read>(reader: R) -> Result<SourceCatalog> {
		let catalog: SourceCatalog = serde_json::from_reader(reader).context("parsing source catalog (JSON)")?;
		catalog.check()?;
		Ok(catalog)
	}

	pub fn from_string(text: &str) -> Result<SourceCatalog> {
		Self::from_reader(text.as_bytes())
	}

	pub fn from_path(path: &Path) -> Result<SourceCatalog> {
		let file = std::fs::File::open(path).with_context(|| format!("opening source catalog {}", path.display()))?;
		Self::from_reader(std::io::BufReader::new(file)).with_context(|| format!("reading {}", path.display()))
	}

	fn check(&self) -> Result<()> {
		let mut seen = std::collections::HashSet::new();
		for source in &self.elevation_sources {
			source.check()?;
			if !seen.insert(&source.id) {
				bail!("duplicate source id '{}'", source.id);
			}
		}
		Ok(())
	}

	/// Enabled sources of one kind, ordered by priority then id.
	#[must_use]
	pub fn enabled(&self, kind: SourceKind) -> Vec<&SourceDescriptor> {
		let mut sources: Vec<&SourceDescriptor> = self
			.elevation_sources
			.iter()
			.filter(|s| s.enabled && s.kind == kind)
			.collect();
		sources.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
		sources
	}

	#[must_use]
	pub fn get(&self, id: &str) -> Option<&SourceDescriptor> {
		self.elevation_sources.iter().find(|s| s.id == id)
	}
}
