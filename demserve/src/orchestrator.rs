//! The per-request fallback state machine.
//!
//! A query walks: ranked campaign candidates → tiles of each matching
//! campaign → the HTTP provider chain → failure. Local problems (nodata
//! pixels, transient storage errors) are absorbed along the way;
//! validation errors and limiter outages in strict mode surface to the
//! caller. Every success carries provenance.

use crate::limiter::{LimiterError, RateLimiter};
use crate::providers::{ElevationProvider, ProviderError};
use crate::sampler::{SampleOutcome, Sampler};
use crate::selector::{Selector, validate_point};
use demserve_core::SelectionPolicy;
use demserve_index::index::IndexedCorpus;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Hard ceiling on any single request, regardless of caller deadline.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// Default skip window for a rate-limited provider
/// (`DEMSERVE_PROVIDER_COOLOFF_SECS` overrides it).
pub const DEFAULT_PROVIDER_COOLOFF: Duration = Duration::from_secs(60);

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
	pub policy: SelectionPolicy,
	/// Restrict the search to one dataset or provider id.
	pub source_id: Option<String>,
	/// Caller deadline; capped at [`DEFAULT_DEADLINE`].
	pub deadline: Option<Duration>,
}

/// The wire-level result of one elevation query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElevationResult {
	pub elevation_m: Option<f64>,
	/// "object-storage", a provider name, or "none".
	pub source: String,
	pub dataset_id: Option<String>,
	pub crs: Option<String>,
	pub message: Option<String>,
}

impl ElevationResult {
	fn miss(message: &str) -> ElevationResult {
		ElevationResult {
			elevation_m: None,
			source: "none".to_string(),
			dataset_id: None,
			crs: None,
			message: Some(message.to_string()),
		}
	}
}

/// Errors surfaced to the caller instead of being absorbed.
#[derive(Debug, Error)]
pub enum QueryError {
	#[error("invalid request: {0}")]
	Validation(String),

	#[error(transparent)]
	ServiceUnavailable(#[from] LimiterError),
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ProviderCounters {
	pub successes: u64,
	pub failures: u64,
	pub rate_limited: u64,
}

pub struct Orchestrator {
	corpus: Arc<IndexedCorpus>,
	selector: Selector,
	sampler: Sampler,
	providers: Vec<Box<dyn ElevationProvider>>,
	limiter: RateLimiter,
	/// How long a rate-limited provider is skipped across requests.
	cooloff: Duration,
	cooloff_until: Mutex<HashMap<String, Instant>>,
	counters: Mutex<BTreeMap<String, ProviderCounters>>,
}

impl Orchestrator {
	#[must_use]
	pub fn new(
		corpus: Arc<IndexedCorpus>,
		sampler: Sampler,
		providers: Vec<Box<dyn ElevationProvider>>,
		limiter: RateLimiter,
		cooloff: Duration,
	) -> Orchestrator {
		Orchestrator {
			corpus,
			selector: Selector::new(),
			sampler,
			providers,
			limiter,
			cooloff,
			cooloff_until: Mutex::new(HashMap::new()),
			counters: Mutex::new(BTreeMap::new()),
		}
	}

	#[must_use]
	pub fn selector(&self) -> &Selector {
		&self.selector
	}

	#[must_use]
	pub fn corpus(&self) -> &Arc<IndexedCorpus> {
		&self.corpus
	}

	/// Per-provider outcome counters since startup.
	#[must_use]
	pub fn provider_counters(&self) -> BTreeMap<String, ProviderCounters> {
		self.counters.lock().expect("counters poisoned").clone()
	}

	/// Resolves a single point.
	pub async fn get_elevation(&self, lat: f64, lon: f64, opts: &QueryOptions) -> Result<ElevationResult, QueryError> {
		validate_point(lat, lon).map_err(|e| QueryError::Validation(e.to_string()))?;
		let started = Instant::now();
		let budget = opts.deadline.unwrap_or(DEFAULT_DEADLINE).min(DEFAULT_DEADLINE);

		let candidates = self.candidates(lat, lon, opts)?;
		let had_candidates = !candidates.is_empty();

		if let Some(result) = self.try_corpus(lat, lon, &candidates, started, budget).await {
			return Ok(result);
		}
		let resolved = self.try_providers(&[(lat, lon)], opts, started, budget).await?;
		if let Some(result) = resolved.into_iter().next().flatten() {
			return Ok(result);
		}

		if started.elapsed() >= budget {
			return Ok(ElevationResult::miss("cancelled"));
		}
		Ok(ElevationResult::miss(if had_candidates {
			"all_sources_exhausted"
		} else {
			"no_coverage"
		}))
	}

	/// Resolves many points, preserving input order.
	///
	/// Points are grouped by their top candidate campaign; points with
	/// no corpus coverage are batched into single provider calls.
	pub async fn get_elevations(
		&self,
		points: &[(f64, f64)],
		opts: &QueryOptions,
	) -> Result<Vec<ElevationResult>, QueryError> {
		for (lat, lon) in points {
			validate_point(*lat, *lon).map_err(|e| QueryError::Validation(e.to_string()))?;
		}
		let started = Instant::now();
		let budget = opts.deadline.unwrap_or(DEFAULT_DEADLINE).min(DEFAULT_DEADLINE);

		let mut results: Vec<Option<ElevationResult>> = vec![None; points.len()];
		let mut covered: Vec<bool> = vec![false; points.len()];

		// Group indices by top candidate campaign.
		let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
		for (i, (lat, lon)) in points.iter().enumerate() {
			let candidates = self.candidates(*lat, *lon, opts)?;
			if let Some(top) = candidates.first() {
				covered[i] = true;
				groups.entry(top.id.clone()).or_default().push(i);
			}
		}

		for (campaign_id, indices) in &groups {
			log::debug!("bulk group '{campaign_id}': {} points", indices.len());
			for &i in indices {
				let (lat, lon) = points[i];
				let candidates = self.candidates(lat, lon, opts)?;
				results[i] = self.try_corpus(lat, lon, &candidates, started, budget).await;
			}
		}

		// Everything still unresolved goes through the provider chain in
		// one batch, escalating point by point.
		let pending: Vec<usize> = (0..points.len()).filter(|i| results[*i].is_none()).collect();
		if !pending.is_empty() {
			let batch: Vec<(f64, f64)> = pending.iter().map(|&i| points[i]).collect();
			let resolved = self.try_providers(&batch, opts, started, budget).await?;
			for (slot, result) in pending.iter().zip(resolved) {
				if result.is_some() {
					results[*slot] = result;
				}
			}
		}

		Ok(results
			.into_iter()
			.zip(covered)
			.map(|(result, covered)| {
				result.unwrap_or_else(|| {
					ElevationResult::miss(if covered { "all_sources_exhausted" } else { "no_coverage" })
				})
			})
			.collect())
	}

	/// Ranked candidates, honoring an explicit `source_id` restriction.
	fn candidates(&self, lat: f64, lon: f64, opts: &QueryOptions) -> Result<Vec<crate::selector::DatasetMatch>, QueryError> {
		if let Some(source_id) = &opts.source_id {
			// A provider name short-circuits the corpus entirely.
			if self.providers.iter().any(|p| p.name() == source_id) {
				return Ok(Vec::new());
			}
			let Some((_, campaign)) = self.corpus.index().campaign(source_id) else {
				return Err(QueryError::Validation(format!("unknown source id '{source_id}'")));
			};
			if !campaign.bounds.contains(lat, lon) {
				return Ok(Vec::new());
			}
			return Ok(vec![crate::selector::DatasetMatch {
				id: source_id.clone(),
				confidence: 1.0,
				priority: campaign.priority,
				file_count: campaign.file_count,
				cost_per_query: campaign.cost_per_query,
				resolution_m: campaign.resolution_m,
			}]);
		}
		self
			.selector
			.rank(&self.corpus, lat, lon, opts.policy)
			.map_err(|e| QueryError::Validation(e.to_string()))
	}

	/// Walks candidate campaigns and their tiles. `None` means the
	/// corpus could not answer and the provider chain should run.
	async fn try_corpus(
		&self,
		lat: f64,
		lon: f64,
		candidates: &[crate::selector::DatasetMatch],
		started: Instant,
		budget: Duration,
	) -> Option<ElevationResult> {
		for candidate in candidates {
			let Some((collection, campaign)) = self.corpus.index().campaign(&candidate.id) else {
				continue;
			};
			let country = collection.country.clone();
			for tile in campaign.tiles_at(lat, lon) {
				if started.elapsed() >= budget {
					let mut result = ElevationResult::miss("cancelled");
					result.dataset_id = Some(candidate.id.clone());
					return Some(result);
				}

				let mut outcome = self.sampler.sample(&country, tile, lat, lon).await;
				if outcome == SampleOutcome::Unavailable {
					// One retry for transient storage failures.
					outcome = self.sampler.sample(&country, tile, lat, lon).await;
				}
				match outcome {
					SampleOutcome::Value(elevation) => {
						return Some(ElevationResult {
							elevation_m: Some(elevation),
							source: "object-storage".to_string(),
							dataset_id: Some(candidate.id.clone()),
							crs: Some(tile.native_crs.code()),
							message: Some(format!("method={} tile={}", tile.method, tile.key)),
						});
					}
					SampleOutcome::NoData | SampleOutcome::Unavailable => continue,
				}
			}
		}
		None
	}

	/// Walks the provider chain for a batch of points. Each provider is
	/// asked only for the points still unanswered; a `None` elevation
	/// escalates that point to the next provider rather than ending the
	/// walk. The returned vector is aligned with `points`; slots no
	/// provider could answer stay `None`.
	async fn try_providers(
		&self,
		points: &[(f64, f64)],
		opts: &QueryOptions,
		started: Instant,
		budget: Duration,
	) -> Result<Vec<Option<ElevationResult>>, QueryError> {
		let mut results: Vec<Option<ElevationResult>> = vec![None; points.len()];
		let mut pending: Vec<usize> = (0..points.len()).collect();

		for provider in &self.providers {
			if pending.is_empty() {
				break;
			}
			let name = provider.name().to_string();
			if let Some(only) = &opts.source_id {
				if self.providers.iter().any(|p| p.name() == only.as_str()) && *only != name {
					continue;
				}
			}

			let remaining = budget.checked_sub(started.elapsed());
			let Some(remaining) = remaining else { break };

			if self.in_cooloff(&name) {
				log::debug!("provider '{name}' in cool-off, skipping");
				continue;
			}
			match provider.check_rate_limit(&self.limiter).await {
				Ok(true) => {}
				Ok(false) => {
					self.note_rate_limited(&name);
					continue;
				}
				// Strict limiter outage propagates as a 503-equivalent.
				Err(e) => return Err(e.into()),
			}

			let batch: Vec<(f64, f64)> = pending.iter().map(|&i| points[i]).collect();
			match provider.fetch_elevations(&batch, remaining).await {
				Ok(elevations) => {
					self.bump(&name, |c| c.successes += 1);
					let mut unanswered = Vec::new();
					for (&slot, elevation) in pending.iter().zip(&elevations) {
						match elevation {
							Some(value) => {
								results[slot] = Some(ElevationResult {
									elevation_m: Some(*value),
									source: name.clone(),
									dataset_id: None,
									crs: Some("EPSG:4326".to_string()),
									message: None,
								});
							}
							None => unanswered.push(slot),
						}
					}
					pending = unanswered;
				}
				Err(ProviderError::RateLimited) => {
					self.note_rate_limited(&name);
					continue;
				}
				Err(e) => {
					// 4xx/5xx/transport: skip for the rest of this request.
					log::warn!("provider '{name}' failed: {e}");
					self.bump(&name, |c| c.failures += 1);
					continue;
				}
			}
		}
		Ok(results)
	}

	fn in_cooloff(&self, name: &str) -> bool {
		self
			.cooloff_until
			.lock()
			.expect("cooloff poisoned")
			.get(name)
			.is_some_and(|until| *until > Instant::now())
	}

	fn note_rate_limited(&self, name: &str) {
		log::warn!("provider '{name}' rate limited, cooling off for {:?}", self.cooloff);
		self
			.cooloff_until
			.lock()
			.expect("cooloff poisoned")
			.insert(name.to_string(), Instant::now() + self.cooloff);
		self.bump(name, |c| c.rate_limited += 1);
	}

	fn bump(&self, name: &str, f: impl FnOnce(&mut ProviderCounters)) {
		f(self.counters.lock().expect("counters poisoned").entry(name.to_string()).or_default());
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::limiter::LimiterMode;
	use async_trait::async_trait;
	use demserve_index::TileStore;
	use demserve_index::extract::Extractor;
	use demserve_index::testing::{SynthTile, model_campaign, single_campaign_index};
	use demserve_core::DataType;
	use std::collections::HashMap;
	use std::sync::atomic::{AtomicU64, Ordering};

	const BRISBANE: (f64, f64) = (-27.4698, 153.0251);
	const OUTBACK: (f64, f64) = (-26.0, 134.0);

	/// Scripted provider behaviors.
	enum MockBehavior {
		Value(f64),
		NoData,
		/// Data for even batch positions only; odd positions get `None`.
		HalfData(f64),
		Fail,
		RateLimitedFetch,
		/// Refuse at the rate-limit check (our own quota).
		QuotaExhausted,
		/// Actually consult the shared limiter.
		UseLimiter,
	}

	struct MockProvider {
		name: &'static str,
		behavior: MockBehavior,
		calls: AtomicU64,
	}

	impl MockProvider {
		fn boxed(name: &'static str, behavior: MockBehavior) -> Box<dyn ElevationProvider> {
			Box::new(MockProvider {
				name,
				behavior,
				calls: AtomicU64::new(0),
			})
		}
	}

	#[async_trait]
	impl ElevationProvider for MockProvider {
		fn name(&self) -> &str {
			self.name
		}

		async fn check_rate_limit(&self, limiter: &RateLimiter) -> Result<bool, LimiterError> {
			match self.behavior {
				MockBehavior::QuotaExhausted => Ok(false),
				MockBehavior::UseLimiter => limiter.check(self.name, 1, Duration::from_secs(60)).await,
				_ => Ok(true),
			}
		}

		async fn fetch_elevations(
			&self,
			points: &[(f64, f64)],
			_timeout: Duration,
		) -> Result<Vec<Option<f64>>, ProviderError> {
			self.calls.fetch_add(1, Ordering::Relaxed);
			match self.behavior {
				MockBehavior::Value(v) => Ok(points.iter().map(|_| Some(v)).collect()),
				MockBehavior::NoData => Ok(points.iter().map(|_| None).collect()),
				MockBehavior::HalfData(v) => Ok((0..points.len()).map(|i| (i % 2 == 0).then_some(v)).collect()),
				MockBehavior::Fail => Err(ProviderError::Http(500)),
				MockBehavior::RateLimitedFetch => Err(ProviderError::RateLimited),
				_ => Ok(points.iter().map(|_| None).collect()),
			}
		}
	}

	/// A one-campaign corpus whose first tile (by key) is all nodata and
	/// whose second carries a gradient, both backed by a real in-memory
	/// GeoTIFF store.
	async fn corpus_fixture() -> (Arc<IndexedCorpus>, Sampler) {
		let store = TileStore::memory();
		let tile_with = |data: Vec<f32>| SynthTile {
			width: 100,
			height: 100,
			origin: (502_000.0, 6_962_000.0),
			pixel_scale: (10.0, 10.0),
			epsg: 28356,
			nodata: Some(-9999.0),
			data,
			..SynthTile::default()
		};
		store
			.put(
				"au/z56/brisbane2019/a_nodata.tif",
				tile_with(vec![-9999.0; 100 * 100]).encode(),
			)
			.await
			.unwrap();
		store
			.put(
				"au/z56/brisbane2019/b_value.tif",
				tile_with(demserve_index::testing::gradient_data(100, 100, 20.0)).encode(),
			)
			.await
			.unwrap();

		let extractor = Extractor::new(store.clone());
		let mut entries = Vec::new();
		for key in ["au/z56/brisbane2019/a_nodata.tif", "au/z56/brisbane2019/b_value.tif"] {
			let object = store.head(key).await.unwrap();
			entries.push(extractor.extract(&object).await);
		}

		let campaign = model_campaign("brisbane2019", DataType::Lidar, 1, 0.001, entries);
		let index = single_campaign_index("brisbane2019_z56", campaign);
		let corpus = Arc::new(IndexedCorpus::new(index));
		let sampler = Sampler::new(HashMap::from([("AU".to_string(), store)]));
		(corpus, sampler)
	}

	fn orchestrator(
		corpus: Arc<IndexedCorpus>,
		sampler: Sampler,
		providers: Vec<Box<dyn ElevationProvider>>,
	) -> Orchestrator {
		let limiter = RateLimiter::new(None, LimiterMode::Local).unwrap();
		Orchestrator::new(corpus, sampler, providers, limiter, DEFAULT_PROVIDER_COOLOFF)
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn corpus_hit_skips_nodata_tile_and_carries_provenance() {
		let (corpus, sampler) = corpus_fixture().await;
		let orch = orchestrator(corpus, sampler, vec![]);

		let result = orch
			.get_elevation(BRISBANE.0, BRISBANE.1, &QueryOptions::default())
			.await
			.unwrap();
		assert!(result.elevation_m.is_some());
		assert_eq!(result.source, "object-storage");
		assert_eq!(result.dataset_id.as_deref(), Some("brisbane2019_z56"));
		assert_eq!(result.crs.as_deref(), Some("EPSG:28356"));
		let message = result.message.unwrap();
		assert!(message.contains("method=raster-header"), "{message}");
		// The all-nodata tile sorts first but must not answer.
		assert!(message.contains("b_value.tif"), "{message}");
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn outback_walks_the_provider_chain_past_rate_limits() {
		let (corpus, sampler) = corpus_fixture().await;
		let orch = orchestrator(
			corpus,
			sampler,
			vec![
				MockProvider::boxed("primary", MockBehavior::QuotaExhausted),
				MockProvider::boxed("backup", MockBehavior::Value(42.5)),
			],
		);

		let result = orch
			.get_elevation(OUTBACK.0, OUTBACK.1, &QueryOptions::default())
			.await
			.unwrap();
		assert_eq!(result.elevation_m, Some(42.5));
		assert_eq!(result.source, "backup");
		assert_eq!(result.dataset_id, None);

		let counters = orch.provider_counters();
		assert_eq!(counters["primary"].rate_limited, 1);
		assert_eq!(counters["backup"].successes, 1);
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn no_data_from_primary_escalates_to_backup() {
		let (corpus, sampler) = corpus_fixture().await;
		let orch = orchestrator(
			corpus,
			sampler,
			vec![
				MockProvider::boxed("spotty", MockBehavior::NoData),
				MockProvider::boxed("backup", MockBehavior::Value(12.0)),
			],
		);

		// The first provider answered the request but had no data for
		// the point; the walk must continue instead of giving up.
		let result = orch.get_elevation(OUTBACK.0, OUTBACK.1, &QueryOptions::default()).await.unwrap();
		assert_eq!(result.elevation_m, Some(12.0));
		assert_eq!(result.source, "backup");

		let counters = orch.provider_counters();
		assert_eq!(counters["spotty"].successes, 1);
		assert_eq!(counters["backup"].successes, 1);
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn bulk_escalates_only_the_unanswered_points() {
		let (corpus, sampler) = corpus_fixture().await;
		let orch = orchestrator(
			corpus,
			sampler,
			vec![
				MockProvider::boxed("partial", MockBehavior::HalfData(5.0)),
				MockProvider::boxed("backup", MockBehavior::Value(6.0)),
			],
		);

		// Both points are outback; the first provider answers only the
		// first of its batch, the second fills in the remainder.
		let points = [OUTBACK, (-25.5, 133.5)];
		let results = orch.get_elevations(&points, &QueryOptions::default()).await.unwrap();
		assert_eq!(results[0].elevation_m, Some(5.0));
		assert_eq!(results[0].source, "partial");
		assert_eq!(results[1].elevation_m, Some(6.0));
		assert_eq!(results[1].source, "backup");
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn rate_limited_fetch_triggers_cooloff() {
		let (corpus, sampler) = corpus_fixture().await;
		let orch = orchestrator(
			corpus,
			sampler,
			vec![
				MockProvider::boxed("flaky", MockBehavior::RateLimitedFetch),
				MockProvider::boxed("steady", MockBehavior::Value(7.0)),
			],
		);

		let first = orch.get_elevation(OUTBACK.0, OUTBACK.1, &QueryOptions::default()).await.unwrap();
		assert_eq!(first.source, "steady");
		// Second request: flaky is in cool-off and is not even asked.
		let second = orch.get_elevation(OUTBACK.0, OUTBACK.1, &QueryOptions::default()).await.unwrap();
		assert_eq!(second.source, "steady");
		assert_eq!(orch.provider_counters()["flaky"].rate_limited, 1);
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn zero_cooloff_retries_the_provider_next_request() {
		let (corpus, sampler) = corpus_fixture().await;
		let limiter = RateLimiter::new(None, LimiterMode::Local).unwrap();
		let orch = Orchestrator::new(
			corpus,
			sampler,
			vec![
				MockProvider::boxed("flaky", MockBehavior::RateLimitedFetch),
				MockProvider::boxed("steady", MockBehavior::Value(3.0)),
			],
			limiter,
			Duration::ZERO,
		);

		orch.get_elevation(OUTBACK.0, OUTBACK.1, &QueryOptions::default()).await.unwrap();
		orch.get_elevation(OUTBACK.0, OUTBACK.1, &QueryOptions::default()).await.unwrap();
		// With a zero cool-off the flaky provider is consulted again.
		assert_eq!(orch.provider_counters()["flaky"].rate_limited, 2);
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn invalid_coordinates_fail_before_selection() {
		let (corpus, sampler) = corpus_fixture().await;
		let orch = orchestrator(corpus, sampler, vec![]);

		let err = orch.get_elevation(999.0, 999.0, &QueryOptions::default()).await.unwrap_err();
		assert!(matches!(err, QueryError::Validation(_)));
		assert_eq!(orch.selector().stats().selections, 0);
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn no_coverage_and_failing_providers_yield_reason_codes() {
		let (corpus, sampler) = corpus_fixture().await;
		let orch = orchestrator(corpus, sampler, vec![MockProvider::boxed("broken", MockBehavior::Fail)]);

		let result = orch.get_elevation(OUTBACK.0, OUTBACK.1, &QueryOptions::default()).await.unwrap();
		assert_eq!(result.elevation_m, None);
		assert_eq!(result.message.as_deref(), Some("no_coverage"));
		assert_eq!(orch.provider_counters()["broken"].failures, 1);
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn strict_limiter_outage_surfaces_service_unavailable() {
		let (corpus, sampler) = corpus_fixture().await;
		let limiter = RateLimiter::new(None, LimiterMode::Strict).unwrap();
		let orch = Orchestrator::new(
			corpus,
			sampler,
			vec![MockProvider::boxed("gated", MockBehavior::UseLimiter)],
			limiter,
			DEFAULT_PROVIDER_COOLOFF,
		);

		let err = orch.get_elevation(OUTBACK.0, OUTBACK.1, &QueryOptions::default()).await.unwrap_err();
		assert!(matches!(err, QueryError::ServiceUnavailable(_)));
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn bulk_preserves_input_order_and_batches_uncovered_points() {
		let (corpus, sampler) = corpus_fixture().await;
		let orch = orchestrator(
			corpus,
			sampler,
			vec![MockProvider::boxed("api", MockBehavior::Value(99.0))],
		);

		let points = [OUTBACK, BRISBANE, OUTBACK];
		let results = orch.get_elevations(&points, &QueryOptions::default()).await.unwrap();
		assert_eq!(results.len(), 3);
		assert_eq!(results[0].source, "api");
		assert_eq!(results[1].source, "object-storage");
		assert_eq!(results[2].source, "api");
		// Both uncovered points went out in a single batched call.
		assert_eq!(orch.provider_counters()["api"].successes, 1);
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn zero_deadline_is_cancelled() {
		let (corpus, sampler) = corpus_fixture().await;
		let orch = orchestrator(corpus, sampler, vec![MockProvider::boxed("api", MockBehavior::Value(1.0))]);

		let opts = QueryOptions {
			deadline: Some(Duration::ZERO),
			..QueryOptions::default()
		};
		let result = orch.get_elevation(BRISBANE.0, BRISBANE.1, &opts).await.unwrap();
		assert_eq!(result.elevation_m, None);
		assert_eq!(result.message.as_deref(), Some("cancelled"));
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn explicit_source_id_restricts_the_search() {
		let (corpus, sampler) = corpus_fixture().await;
		let orch = orchestrator(corpus, sampler, vec![]);

		let opts = QueryOptions {
			source_id: Some("brisbane2019_z56".to_string()),
			..QueryOptions::default()
		};
		let result = orch.get_elevation(BRISBANE.0, BRISBANE.1, &opts).await.unwrap();
		assert_eq!(result.dataset_id.as_deref(), Some("brisbane2019_z56"));

		let unknown = QueryOptions {
			source_id: Some("nope".to_string()),
			..QueryOptions::default()
		};
		let err = orch.get_elevation(BRISBANE.0, BRISBANE.1, &unknown).await.unwrap_err();
		assert!(matches!(err, QueryError::Validation(_)));
	}
}
