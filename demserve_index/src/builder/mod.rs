//! Index construction and incremental update.
//!
//! A bounded pool of extraction workers feeds a single consumer that
//! owns every mutation of the in-progress index. Progress is
//! checkpointed to side files so interrupted runs resume instead of
//! restarting, and a finished index only replaces the served file after
//! structural validation passes.

mod grouping;

pub use grouping::{CampaignKey, CountryScheme, campaign_key, mine_year};

use crate::extract::{Extractor, regional_bounds};
use crate::index::validate;
use crate::model::{Campaign, Collection, SpatialIndex, TileEntry};
use crate::storage::{ObjectRef, TileStore};
use anyhow::{Context, Result};
use chrono::Utc;
use demserve_core::Bounds;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Tuning knobs of a build run. Defaults follow the corpus defaults:
/// an I/O-bound worker pool and a checkpoint every 10 000 tiles.
#[derive(Debug, Clone)]
pub struct BuildConfig {
	pub scheme: CountryScheme,
	/// Parallel header fetches. I/O bound, so sized from CPU count but
	/// kept within the 20..=50 band that object storage tolerates well.
	pub workers: usize,
	pub checkpoint_every: u64,
	/// Campaigns with fewer tiles than this are dropped at the end.
	pub min_campaign_tiles: usize,
	/// Validation builds: cap per detected region for a representative
	/// cross-section instead of the full corpus.
	pub sample_per_region: Option<usize>,
	/// A run fails once this share of extractions lands on the regional
	/// fallback.
	pub max_failure_ratio: f64,
}

impl BuildConfig {
	#[must_use]
	pub fn new(scheme: CountryScheme) -> BuildConfig {
		BuildConfig {
			scheme,
			workers: (num_cpus::get() * 3).clamp(20, 50),
			checkpoint_every: 10_000,
			min_campaign_tiles: 1,
			sample_per_region: None,
			max_failure_ratio: 0.10,
		}
	}
}

/// Why a build run was aborted. The CLI maps these onto exit codes.
#[derive(Debug, Error)]
pub enum BuildError {
	#[error("structural validation failed: {}", problems.join("; "))]
	Validation { problems: Vec<String> },

	#[error("{failed} of {total} extractions fell back to regional bounds (limit {limit:.0}%)")]
	TooManyFailures { failed: u64, total: u64, limit: f64 },

	#[error("build interrupted; checkpoint flushed")]
	Interrupted,

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

/// Outcome of a successful run.
#[derive(Debug)]
pub struct BuildReport {
	pub index: SpatialIndex,
	pub extracted: u64,
	pub regional_fallbacks: u64,
	pub by_method: BTreeMap<String, u64>,
}

pub struct IndexBuilder {
	store: TileStore,
	config: BuildConfig,
}

impl IndexBuilder {
	#[must_use]
	pub fn new(store: TileStore, config: BuildConfig) -> IndexBuilder {
		IndexBuilder { store, config }
	}

	/// Full build from an empty index. If `index_path` has checkpoints
	/// from an interrupted run, extraction resumes after them.
	pub async fn build_full(
		&self,
		index_path: &Path,
		shutdown: Option<tokio::sync::watch::Receiver<bool>>,
	) -> Result<BuildReport, BuildError> {
		let mut index = match latest_checkpoint(index_path)? {
			Some((path, checkpoint)) => {
				log::info!("resuming from checkpoint {}", path.display());
				checkpoint
			}
			None => SpatialIndex::new(self.store.bucket()),
		};
		index.bucket = self.store.bucket().to_string();

		let objects = self.enumerate(Some(&index), false).await?;
		self.run(index, objects, index_path, false, shutdown).await
	}

	/// Incremental update: only objects newer than the existing index's
	/// generation timestamp (or absent from it) are re-extracted.
	pub async fn update_incremental(
		&self,
		existing: SpatialIndex,
		index_path: &Path,
		shutdown: Option<tokio::sync::watch::Receiver<bool>>,
	) -> Result<BuildReport, BuildError> {
		let objects = self.enumerate(Some(&existing), true).await?;
		self.run(existing, objects, index_path, true, shutdown).await
	}

	async fn enumerate(&self, existing: Option<&SpatialIndex>, incremental: bool) -> Result<Vec<ObjectRef>> {
		let mut objects = self.store.list_rasters(None).await?;
		let total = objects.len();

		if let Some(index) = existing {
			let known = index.tile_keys();
			if incremental {
				let watermark = index.generated_at;
				objects.retain(|o| o.last_modified > watermark || !known.contains(&o.key));
			} else {
				// Resume path: skip whatever a checkpoint already covers.
				objects.retain(|o| !known.contains(&o.key));
			}
		}

		if let Some(quota) = self.config.sample_per_region {
			objects = stratify(objects, quota);
		}

		log::info!(
			"enumerated {} raster objects ({} selected for extraction)",
			total,
			objects.len()
		);
		Ok(objects)
	}

	async fn run(
		&self,
		mut index: SpatialIndex,
		objects: Vec<ObjectRef>,
		index_path: &Path,
		incremental: bool,
		shutdown: Option<tokio::sync::watch::Receiver<bool>>,
	) -> Result<BuildReport, BuildError> {
		let total = objects.len() as u64;
		let extractor = std::sync::Arc::new(Extractor::new(self.store.clone()));

		// Bounded fan-out: `workers` extractions in flight, results
		// queued up to 4x that depth before producers block.
		let (tx, mut rx) = tokio::sync::mpsc::channel::<TileEntry>(self.config.workers * 4);
		let workers = self.config.workers;
		let producer = {
			let extractor = std::sync::Arc::clone(&extractor);
			tokio::spawn(async move {
				let mut stream = futures::stream::iter(objects.into_iter().map(|object| {
					let extractor = std::sync::Arc::clone(&extractor);
					async move { extractor.extract(&object).await }
				}))
				.buffer_unordered(workers);
				while let Some(entry) = stream.next().await {
					if tx.send(entry).await.is_err() {
						break; // consumer stopped (shutdown)
					}
				}
			})
		};

		// Single consumer owns all index mutation.
		let mut extracted = 0u64;
		let mut regional = 0u64;
		let mut by_method: BTreeMap<String, u64> = BTreeMap::new();
		let mut interrupted = false;
		while let Some(entry) = rx.recv().await {
			*by_method.entry(entry.method.to_string()).or_default() += 1;
			if entry.method == demserve_core::ExtractMethod::RegionalFallback {
				regional += 1;
			}
			self.merge_tile(&mut index, entry);
			extracted += 1;

			if extracted % 1000 == 0 {
				log::info!("extracted {extracted}/{total} tiles ({regional} regional fallbacks)");
			}
			if self.config.checkpoint_every > 0 && extracted % self.config.checkpoint_every == 0 {
				self.write_checkpoint(&mut index, index_path, extracted)?;
			}
			if let Some(signal) = &shutdown {
				if *signal.borrow() {
					interrupted = true;
					break;
				}
			}
		}
		drop(rx);
		producer.abort();

		if interrupted {
			self.write_checkpoint(&mut index, index_path, extracted)?;
			return Err(BuildError::Interrupted);
		}

		if total > 0 && (regional as f64) / (total as f64) > self.config.max_failure_ratio {
			return Err(BuildError::TooManyFailures {
				failed: regional,
				total,
				limit: self.config.max_failure_ratio * 100.0,
			});
		}

		self.prune_small_campaigns(&mut index);
		index.generated_at = Utc::now();
		if incremental {
			index.last_incremental_update = Some(index.generated_at);
		}
		index.recompute().context("recomputing index aggregates")?;

		let report = validate(&index);
		if !report.is_ok() {
			let rejected = index_path.with_extension("json.rejected");
			if let Ok(text) = serde_json::to_string_pretty(&index) {
				let _ = std::fs::write(&rejected, text);
				log::error!("rejected index written to {}", rejected.display());
			}
			return Err(BuildError::Validation {
				problems: report.problems,
			});
		}

		index.save_atomic(index_path).context("saving index")?;
		remove_checkpoints(index_path);

		log::info!(
			"index build complete: {} tiles in {} campaigns",
			index.total_tile_count,
			index.campaigns().count()
		);
		Ok(BuildReport {
			index,
			extracted,
			regional_fallbacks: regional,
			by_method,
		})
	}

	/// Routes one extracted tile into its collection and campaign,
	/// creating both lazily. Replaces any previous entry with the same
	/// key.
	fn merge_tile(&self, index: &mut SpatialIndex, entry: TileEntry) {
		let key = campaign_key(self.config.scheme, &entry);
		let country = self.config.scheme.country_code();

		let collection = match index.collections.iter_mut().position(|c| c.country == country) {
			Some(i) => &mut index.collections[i],
			None => {
				index
					.collections
					.push(Collection::new(country, self.config.scheme.coordinate_system()));
				index.collections.last_mut().expect("just pushed")
			}
		};

		let campaign = collection.campaigns.entry(key.campaign_id.clone()).or_insert_with(|| Campaign {
			name: key.name.clone(),
			provider: key.provider.clone(),
			data_type: key.data_type.clone(),
			resolution_m: 1.0,
			priority: if self.config.scheme == CountryScheme::Nz { 1 } else { 2 },
			cost_per_query: 0.001,
			bounds: entry.bounds,
			campaign_year: key.campaign_year,
			survey_name: key.survey_name.clone(),
			file_count: 0,
			files: Vec::new(),
		});

		campaign.files.retain(|t| t.key != entry.key);
		campaign.files.push(entry);
	}

	fn prune_small_campaigns(&self, index: &mut SpatialIndex) {
		if self.config.min_campaign_tiles <= 1 {
			return;
		}
		for collection in &mut index.collections {
			collection.campaigns.retain(|id, campaign| {
				let keep = campaign.files.len() >= self.config.min_campaign_tiles;
				if !keep {
					log::info!(
						"dropping campaign '{id}' with only {} tiles (minimum {})",
						campaign.files.len(),
						self.config.min_campaign_tiles
					);
				}
				keep
			});
		}
		index.collections.retain(|c| !c.campaigns.is_empty());
	}

	fn write_checkpoint(&self, index: &mut SpatialIndex, index_path: &Path, count: u64) -> Result<(), BuildError> {
		index.recompute().context("recomputing checkpoint aggregates")?;
		let path = checkpoint_path(index_path, count);
		let text = serde_json::to_string(index).context("serializing checkpoint")?;
		std::fs::write(&path, text).with_context(|| format!("writing checkpoint {}", path.display()))?;
		log::info!("checkpoint saved: {}", path.display());
		Ok(())
	}
}

/// Buckets keys by detected region and keeps at most `quota` per bucket.
/// Input order (sorted by key) is preserved within buckets.
fn stratify(objects: Vec<ObjectRef>, quota: usize) -> Vec<ObjectRef> {
	let mut taken: BTreeMap<&'static str, usize> = BTreeMap::new();
	let mut out = Vec::new();
	for object in objects {
		let (_, region) = regional_bounds(&object.key);
		let count = taken.entry(region).or_default();
		if *count < quota {
			*count += 1;
			out.push(object);
		}
	}
	out
}

fn checkpoint_path(index_path: &Path, count: u64) -> PathBuf {
	index_path.with_extension(format!("checkpoint_{count}.json"))
}

/// Finds the checkpoint with the highest extraction count next to
/// `index_path`, if any.
fn latest_checkpoint(index_path: &Path) -> Result<Option<(PathBuf, SpatialIndex)>> {
	let Some(dir) = index_path.parent() else {
		return Ok(None);
	};
	let Some(stem) = index_path.file_stem().and_then(|s| s.to_str()) else {
		return Ok(None);
	};
	if !dir.exists() {
		return Ok(None);
	}

	let mut best: Option<(u64, PathBuf)> = None;
	for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
		let path = entry?.path();
		let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
			continue;
		};
		let Some(rest) = name.strip_prefix(&format!("{stem}.checkpoint_")) else {
			continue;
		};
		let Some(count) = rest.strip_suffix(".json").and_then(|c| c.parse::<u64>().ok()) else {
			continue;
		};
		if best.as_ref().is_none_or(|(b, _)| count > *b) {
			best = Some((count, path));
		}
	}

	match best {
		Some((_, path)) => {
			let index = SpatialIndex::load(&path).with_context(|| format!("loading checkpoint {}", path.display()))?;
			Ok(Some((path, index)))
		}
		None => Ok(None),
	}
}

fn remove_checkpoints(index_path: &Path) {
	let Some(dir) = index_path.parent() else { return };
	let Some(stem) = index_path.file_stem().and_then(|s| s.to_str()) else {
		return;
	};
	let Ok(entries) = std::fs::read_dir(dir) else { return };
	for entry in entries.flatten() {
		let path = entry.path();
		if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
			if name.starts_with(&format!("{stem}.checkpoint_")) && name.ends_with(".json") {
				let _ = std::fs::remove_file(&path);
			}
		}
	}
}
