//! Single-pixel elevation sampling from indexed tiles.
//!
//! The sampler owns one [`TileStore`] per collection country and reads
//! exactly the pixel under the query point: header pages for the
//! geotransform, then the strip or tile containing the pixel.

use demserve_core::geo::point_from_wgs84;
use demserve_index::{TileEntry, TileStore};
use std::collections::HashMap;

/// What a sample attempt produced. `Unavailable` is retryable;
/// `NoData` means the tile genuinely has no value at this point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
	Value(f64),
	NoData,
	Unavailable,
}

pub struct Sampler {
	stores: HashMap<String, TileStore>,
}

impl Sampler {
	/// `stores` maps collection country codes ("AU", "NZ") to their
	/// bucket handles.
	#[must_use]
	pub fn new(stores: HashMap<String, TileStore>) -> Sampler {
		Sampler { stores }
	}

	#[must_use]
	pub fn has_store(&self, country: &str) -> bool {
		self.stores.contains_key(country)
	}

	/// Reads the elevation under `(lat, lon)` from one tile.
	///
	/// The query point is reprojected into the tile's native CRS, the
	/// covering pixel located through the raster header, and its raw
	/// value checked against the nodata sentinel. Every I/O failure maps
	/// to `Unavailable` so the orchestrator can retry or move on.
	pub async fn sample(&self, country: &str, tile: &TileEntry, lat: f64, lon: f64) -> SampleOutcome {
		let Some(store) = self.stores.get(country) else {
			eprintln!("no tile store configured for country '{country}'");
			return SampleOutcome::Unavailable;
		};

		// The index already knows size and timestamp; no extra HEAD call.
		let object = demserve_index::ObjectRef {
			key: tile.key.clone(),
			size: tile.size_bytes,
			last_modified: tile.last_modified,
		};

		let header = match store.open_header(&object).await {
			Ok(header) => header,
			Err(e) => {
				eprintln!("header read failed for '{}': {e:#}", tile.key);
				return SampleOutcome::Unavailable;
			}
		};

		let (x, y) = match point_from_wgs84(lat, lon, &header.crs) {
			Ok(native) => native,
			Err(e) => {
				eprintln!("cannot project query point into '{}': {e}", tile.key);
				return SampleOutcome::Unavailable;
			}
		};

		let Some((col, row)) = header.pixel_for(x, y) else {
			// Bbox said yes but the raster grid says no; treat like a
			// nodata hole and let the next tile answer.
			return SampleOutcome::NoData;
		};

		let value = match store.read_pixel(&object, col, row).await {
			Ok(value) => value,
			Err(e) => {
				eprintln!("pixel read failed for '{}' ({col}, {row}): {e:#}", tile.key);
				return SampleOutcome::Unavailable;
			}
		};

		if value.is_nan() || header.nodata.is_some_and(|nodata| (value - nodata).abs() < 1e-6) {
			return SampleOutcome::NoData;
		}
		SampleOutcome::Value(value)
	}
}
