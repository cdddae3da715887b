//! The engine owns every long-lived resource of a serving process: the
//! loaded spatial index, the source catalog, tile stores, the provider
//! chain and the rate limiter. It is created once at startup and shared
//! read-only by request handlers.

use crate::catalog::{SourceCatalog, SourceKind};
use crate::limiter::RateLimiter;
use crate::orchestrator::Orchestrator;
use crate::providers::provider_chain;
use crate::sampler::Sampler;
use crate::settings::Settings;
use anyhow::{Context, Result, bail};
use demserve_index::index::IndexedCorpus;
use demserve_index::model::{IndexError, SpatialIndex};
use demserve_index::TileStore;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Startup failures, split so the CLI can map schema/structure problems
/// onto their dedicated exit code.
#[derive(Debug, Error)]
pub enum StartupError {
	#[error(transparent)]
	Index(#[from] IndexError),

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

pub struct Engine {
	corpus: Arc<IndexedCorpus>,
	catalog: SourceCatalog,
	orchestrator: Orchestrator,
}

impl Engine {
	/// Boots an engine from process settings: catalog, validated index,
	/// tile stores, provider chain, rate limiter.
	pub fn load(settings: &Settings) -> Result<Engine, StartupError> {
		let catalog = SourceCatalog::from_path(&settings.sources_path)?;
		let index = SpatialIndex::load_validated(&settings.index_path)?;
		log::info!(
			"loaded spatial index: {} tiles, generated {}",
			index.total_tile_count,
			index.generated_at
		);
		let corpus = Arc::new(IndexedCorpus::new(index));

		let mut stores = HashMap::new();
		for descriptor in catalog.enabled(SourceKind::ObjectStorage) {
			let Some(country) = descriptor.meta_str("country") else {
				return Err(anyhow::anyhow!("object-storage source '{}' is missing metadata.country", descriptor.id).into());
			};
			let store = open_store(&descriptor.path).with_context(|| format!("opening store for '{}'", descriptor.id))?;
			stores.insert(country.to_string(), store);
		}

		let providers = provider_chain(&catalog.enabled(SourceKind::HttpApi)).map_err(StartupError::Other)?;
		let limiter =
			RateLimiter::new(settings.redis_url.as_deref(), settings.limiter_mode).map_err(StartupError::Other)?;
		let orchestrator = Orchestrator::new(
			Arc::clone(&corpus),
			Sampler::new(stores),
			providers,
			limiter,
			settings.provider_cooloff,
		);

		Ok(Engine {
			corpus,
			catalog,
			orchestrator,
		})
	}

	/// Direct constructor for tests and embedded use.
	#[must_use]
	pub fn new(corpus: Arc<IndexedCorpus>, catalog: SourceCatalog, orchestrator: Orchestrator) -> Engine {
		Engine {
			corpus,
			catalog,
			orchestrator,
		}
	}

	#[must_use]
	pub fn corpus(&self) -> &Arc<IndexedCorpus> {
		&self.corpus
	}

	#[must_use]
	pub fn catalog(&self) -> &SourceCatalog {
		&self.catalog
	}

	#[must_use]
	pub fn orchestrator(&self) -> &Orchestrator {
		&self.orchestrator
	}
}

/// Opens a tile store from a catalog path: `s3://bucket`, `file:///dir`,
/// `memory:`, or a bare directory path.
fn open_store(path: &str) -> Result<TileStore> {
	if let Some(bucket) = path.strip_prefix("s3://") {
		let bucket = bucket.trim_end_matches('/');
		if bucket.is_empty() {
			bail!("empty bucket in '{path}'");
		}
		return TileStore::s3_from_env(bucket);
	}
	if path == "memory:" {
		return Ok(TileStore::memory());
	}
	let dir = path.strip_prefix("file://").unwrap_or(path);
	TileStore::local(std::path::Path::new(dir))
}
