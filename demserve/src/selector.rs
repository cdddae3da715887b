//! Policy-driven dataset selection.
//!
//! Given a coordinate, ranks the campaigns whose bounds contain it by a
//! weighted confidence score. The active [`SelectionPolicy`] chooses the
//! weight vector; component scores themselves are fixed threshold
//! functions of campaign properties. A small LRU cache short-circuits
//! repeated queries for the same rounded coordinate.

use anyhow::{Result, bail};
use demserve_core::{DataType, SelectionPolicy};
use demserve_index::index::IndexedCorpus;
use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Providers considered reliable for the `provider_reliability`
/// component.
const TRUSTED_PROVIDERS: &[&str] = &["elvis", "ga", "linz"];

/// Above this confidence the top candidate is returned alone and the
/// search stops after its campaign.
pub const HIGH_CONFIDENCE: f64 = 0.8;

const CACHE_CAPACITY: usize = 1000;

/// Weight vector for the confidence components. Weights are renormalized
/// so their sum never exceeds 1, keeping confidence within [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyWeights {
	pub bounds_overlap: f64,
	pub bounds_specificity: f64,
	pub center_proximity: f64,
	pub resolution_preference: f64,
	pub data_type_quality: f64,
	pub provider_reliability: f64,
	pub cost_efficiency: f64,
}

impl PolicyWeights {
	#[must_use]
	pub fn for_policy(policy: SelectionPolicy) -> PolicyWeights {
		use SelectionPolicy::*;
		let weights = match policy {
			Fastest => PolicyWeights {
				bounds_overlap: 0.40,
				bounds_specificity: 0.40,
				center_proximity: 0.20,
				resolution_preference: 0.20,
				data_type_quality: 0.10,
				provider_reliability: 0.05,
				cost_efficiency: 0.00,
			},
			Cheapest => PolicyWeights {
				bounds_overlap: 0.30,
				bounds_specificity: 0.20,
				center_proximity: 0.10,
				resolution_preference: 0.05,
				data_type_quality: 0.05,
				provider_reliability: 0.05,
				cost_efficiency: 0.25,
			},
			Balanced => PolicyWeights {
				bounds_overlap: 0.35,
				bounds_specificity: 0.30,
				center_proximity: 0.15,
				resolution_preference: 0.15,
				data_type_quality: 0.08,
				provider_reliability: 0.05,
				cost_efficiency: 0.12,
			},
			Quality => PolicyWeights {
				bounds_overlap: 0.30,
				bounds_specificity: 0.20,
				center_proximity: 0.10,
				resolution_preference: 0.30,
				data_type_quality: 0.20,
				provider_reliability: 0.10,
				cost_efficiency: 0.00,
			},
		};
		weights.normalized()
	}

	fn total(&self) -> f64 {
		self.bounds_overlap
			+ self.bounds_specificity
			+ self.center_proximity
			+ self.resolution_preference
			+ self.data_type_quality
			+ self.provider_reliability
			+ self.cost_efficiency
	}

	#[must_use]
	pub fn normalized(self) -> PolicyWeights {
		let total = self.total();
		if total <= 1.0 {
			return self;
		}
		let f = 1.0 / total;
		PolicyWeights {
			bounds_overlap: self.bounds_overlap * f,
			bounds_specificity: self.bounds_specificity * f,
			center_proximity: self.center_proximity * f,
			resolution_preference: self.resolution_preference * f,
			data_type_quality: self.data_type_quality * f,
			provider_reliability: self.provider_reliability * f,
			cost_efficiency: self.cost_efficiency * f,
		}
	}
}

/// One ranked candidate dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetMatch {
	pub id: String,
	pub confidence: f64,
	pub priority: u32,
	pub file_count: u64,
	pub cost_per_query: f64,
	pub resolution_m: f64,
}

/// Per-point selection summary for the debugging endpoint.
#[derive(Debug, Serialize)]
pub struct SelectionSummary {
	pub lat: f64,
	pub lon: f64,
	pub policy: SelectionPolicy,
	pub best: Option<DatasetMatch>,
	pub options: Vec<DatasetMatch>,
	pub reason: String,
}

/// Usage counters, exposed by the health endpoint.
#[derive(Debug, Serialize)]
pub struct SelectorStats {
	pub selections: u64,
	pub cache_hits: u64,
}

pub struct Selector {
	cache: Mutex<LruCache<String, Vec<DatasetMatch>>>,
	selections: AtomicU64,
	cache_hits: AtomicU64,
}

impl Default for Selector {
	fn default() -> Self {
		Selector {
			cache: Mutex::new(LruCache::new(
				NonZeroUsize::new(CACHE_CAPACITY).expect("non-zero cache capacity"),
			)),
			selections: AtomicU64::new(0),
			cache_hits: AtomicU64::new(0),
		}
	}
}

impl Selector {
	#[must_use]
	pub fn new() -> Selector {
		Selector::default()
	}

	/// Ranks candidate campaigns for a point under a policy.
	///
	/// The returned list is sorted by descending confidence with ties
	/// broken by ascending priority, ascending cost and lexicographic
	/// id. When the leader clears [`HIGH_CONFIDENCE`] it is returned
	/// alone so the orchestrator stops after one campaign.
	pub fn rank(
		&self,
		corpus: &IndexedCorpus,
		lat: f64,
		lon: f64,
		policy: SelectionPolicy,
	) -> Result<Vec<DatasetMatch>> {
		validate_point(lat, lon)?;
		self.selections.fetch_add(1, Ordering::Relaxed);

		let cache_key = format!("{lat:.6},{lon:.6},{policy}");
		if let Some(cached) = self.cache.lock().expect("selector cache poisoned").get(&cache_key) {
			self.cache_hits.fetch_add(1, Ordering::Relaxed);
			return Ok(cached.clone());
		}

		let weights = PolicyWeights::for_policy(policy);
		let mut matches: Vec<DatasetMatch> = corpus
			.index()
			.campaigns()
			.filter_map(|(_, id, campaign)| {
				let confidence = confidence_for(lat, lon, campaign, &weights)?;
				Some(DatasetMatch {
					id: id.to_string(),
					confidence,
					priority: campaign.priority,
					file_count: campaign.file_count,
					cost_per_query: campaign.cost_per_query,
					resolution_m: campaign.resolution_m,
				})
			})
			.collect();

		matches.sort_by(|a, b| {
			b.confidence
				.partial_cmp(&a.confidence)
				.unwrap_or(std::cmp::Ordering::Equal)
				.then_with(|| a.priority.cmp(&b.priority))
				.then_with(|| a.cost_per_query.partial_cmp(&b.cost_per_query).unwrap_or(std::cmp::Ordering::Equal))
				.then_with(|| a.id.cmp(&b.id))
		});

		if matches.first().is_some_and(|top| top.confidence > HIGH_CONFIDENCE) {
			matches.truncate(1);
		}

		log::debug!(
			"selector ({policy}) found {} candidates for ({lat:.6}, {lon:.6})",
			matches.len()
		);
		self
			.cache
			.lock()
			.expect("selector cache poisoned")
			.put(cache_key, matches.clone());
		Ok(matches)
	}

	/// Full ranking plus a human-readable reason, for diagnostics.
	pub fn summary(
		&self,
		corpus: &IndexedCorpus,
		lat: f64,
		lon: f64,
		policy: SelectionPolicy,
	) -> Result<SelectionSummary> {
		let options = self.rank(corpus, lat, lon, policy)?;
		let best = options.first().cloned();
		let reason = match (&best, options.len()) {
			(None, _) => "no coverage at this location".to_string(),
			(Some(b), 1) => format!("selected '{}' (confidence {:.2})", b.id, b.confidence),
			(Some(b), n) => format!("selected '{}' from {n} options (confidence {:.2})", b.id, b.confidence),
		};
		Ok(SelectionSummary {
			lat,
			lon,
			policy,
			best,
			options,
			reason,
		})
	}

	#[must_use]
	pub fn stats(&self) -> SelectorStats {
		SelectorStats {
			selections: self.selections.load(Ordering::Relaxed),
			cache_hits: self.cache_hits.load(Ordering::Relaxed),
		}
	}
}

/// Rejects non-finite or out-of-range coordinates before any index work.
pub fn validate_point(lat: f64, lon: f64) -> Result<()> {
	if !lat.is_finite() || !lon.is_finite() {
		bail!("coordinates must be finite numbers, got ({lat}, {lon})");
	}
	if !(-90.0..=90.0).contains(&lat) {
		bail!("latitude must be within [-90, 90], got {lat}");
	}
	if !(-180.0..=180.0).contains(&lon) {
		bail!("longitude must be within [-180, 180], got {lon}");
	}
	Ok(())
}

/// Weighted confidence of one campaign for one point, or `None` when the
/// point is outside the campaign bounds (excluded, not zero-scored).
fn confidence_for(lat: f64, lon: f64, campaign: &demserve_index::Campaign, w: &PolicyWeights) -> Option<f64> {
	let bounds = &campaign.bounds;
	if !bounds.contains(lat, lon) {
		return None;
	}

	let mut score = w.bounds_overlap;

	let (lat_range, lon_range) = (bounds.lat_range(), bounds.lon_range());
	score += if lat_range < 2.0 && lon_range < 2.0 {
		w.bounds_specificity
	} else if lat_range < 5.0 && lon_range < 5.0 {
		w.bounds_specificity * 0.5
	} else {
		0.0
	};

	let (center_lat, center_lon) = bounds.center();
	let (lat_distance, lon_distance) = ((lat - center_lat).abs(), (lon - center_lon).abs());
	score += if lat_distance < lat_range * 0.25 && lon_distance < lon_range * 0.25 {
		w.center_proximity
	} else if lat_distance < lat_range * 0.5 && lon_distance < lon_range * 0.5 {
		w.center_proximity * 0.5
	} else {
		0.0
	};

	score += if campaign.resolution_m <= 1.0 {
		w.resolution_preference
	} else if campaign.resolution_m <= 5.0 {
		w.resolution_preference * 0.5
	} else {
		0.0
	};

	score += match campaign.data_type {
		DataType::Lidar => w.data_type_quality,
		DataType::Dem => w.data_type_quality * 0.5,
		_ => 0.0,
	};

	let provider = campaign.provider.to_ascii_lowercase();
	if TRUSTED_PROVIDERS.iter().any(|t| provider.contains(t)) {
		score += w.provider_reliability;
	}

	score += if campaign.cost_per_query <= 0.001 {
		w.cost_efficiency
	} else if campaign.cost_per_query <= 0.01 {
		w.cost_efficiency * 0.5
	} else {
		0.0
	};

	Some(score.min(1.0))
}
