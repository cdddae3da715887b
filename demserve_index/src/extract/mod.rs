//! Tile metadata extraction.
//!
//! Converts one object reference into a [`TileEntry`] without ever
//! transferring pixel data. Strategies run in a fixed order:
//!
//! 1. read the raster header (retried once) and reproject its bounds,
//! 2. decode a grid reference from the filename,
//! 3. fall back to a coarse regional box from path substrings.
//!
//! The third strategy cannot fail, so extraction always produces an
//! entry; the `method` and `precision` fields record how trustworthy it
//! is.

mod filename;
mod regional;

pub use filename::{GridRef, parse_grid_filename};
pub use regional::regional_bounds;

use crate::model::TileEntry;
use crate::storage::{ObjectRef, TileStore};
use demserve_core::{Bounds, Crs, CrsFamily, ExtractError, ExtractMethod, PrecisionClass, detect_crs_family};

pub struct Extractor {
	store: TileStore,
}

impl Extractor {
	#[must_use]
	pub fn new(store: TileStore) -> Extractor {
		Extractor { store }
	}

	/// Extracts metadata for one object, falling through the strategy
	/// chain until one produces plausible WGS84 bounds.
	pub async fn extract(&self, object: &ObjectRef) -> TileEntry {
		match self.try_raster_header(object).await {
			Ok(entry) => return entry,
			Err(reason) => {
				log::debug!("header strategy failed for '{}': {reason}", object.key);
			}
		}

		let filename = object.key.rsplit('/').next().unwrap_or(&object.key);
		match filename_grid_bounds(filename) {
			Ok((bounds, zone)) => {
				return self.entry(object, bounds, Crs::UtmSouth { zone }, ExtractMethod::FilenameGrid, None);
			}
			Err(reason) => log::debug!("filename strategy failed for '{}': {reason}", object.key),
		}

		let (bounds, region) = regional_bounds(&object.key);
		log::debug!("using regional fallback '{region}' for '{}'", object.key);
		self.entry(object, bounds, Crs::Wgs84, ExtractMethod::RegionalFallback, None)
	}

	async fn try_raster_header(&self, object: &ObjectRef) -> Result<TileEntry, ExtractError> {
		// One retry on any header failure; object storage reads are
		// transiently flaky at corpus scale.
		let header = match self.store.open_header(object).await {
			Ok(header) => header,
			Err(first) => {
				log::debug!("retrying header read for '{}': {first:#}", object.key);
				self
					.store
					.open_header(object)
					.await
					.map_err(|e| ExtractError::HeaderUnreadable(format!("{e:#}")))?
			}
		};

		let bounds = header.bounds_wgs84()?;
		match detect_crs_family(bounds.min_lat, bounds.max_lat, bounds.min_lon, bounds.max_lon) {
			CrsFamily::Wgs84 => {}
			family => {
				return Err(ExtractError::OutsideExpectedRegion(format!(
					"header bounds {bounds:?} classify as {family:?}"
				)));
			}
		}

		Ok(self.entry(
			object,
			bounds,
			header.crs.clone(),
			ExtractMethod::RasterHeader,
			Some(&header),
		))
	}

	fn entry(
		&self,
		object: &ObjectRef,
		bounds: Bounds,
		native_crs: Crs,
		method: ExtractMethod,
		header: Option<&crate::geotiff::RasterHeader>,
	) -> TileEntry {
		let precision = match method {
			ExtractMethod::RegionalFallback => PrecisionClass::Regional,
			_ => PrecisionClass::from_area_deg2(bounds.area_deg2()),
		};
		TileEntry {
			key: object.key.clone(),
			filename: object.key.rsplit('/').next().unwrap_or(&object.key).to_string(),
			bounds,
			native_crs,
			pixel_size_x: header.map(|h| h.pixel_scale.0),
			pixel_size_y: header.map(|h| h.pixel_scale.1),
			width: header.map(|h| h.width),
			height: header.map(|h| h.height),
			precision,
			method,
			size_bytes: object.size,
			last_modified: object.last_modified,
		}
	}
}

fn in_region(bounds: &Bounds) -> bool {
	detect_crs_family(bounds.min_lat, bounds.max_lat, bounds.min_lon, bounds.max_lon) == CrsFamily::Wgs84
}

/// Decodes a grid filename into WGS84 bounds, rejecting cells that land
/// outside the corpus region.
fn filename_grid_bounds(filename: &str) -> Result<(Bounds, u8), ExtractError> {
	let grid =
		parse_grid_filename(filename).ok_or_else(|| ExtractError::UnrecognizedPattern(filename.to_string()))?;
	let bounds = grid
		.to_bounds()
		.map_err(|e| ExtractError::OutsideExpectedRegion(e.to_string()))?;
	if !in_region(&bounds) {
		return Err(ExtractError::OutsideExpectedRegion(format!(
			"grid cell decodes to {bounds:?}"
		)));
	}
	Ok((bounds, grid.zone))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{SynthTile, gradient_data};

	async fn store_with(key: &str, bytes: Vec<u8>) -> (TileStore, ObjectRef) {
		let store = TileStore::memory();
		store.put(key, bytes).await.unwrap();
		let object = store.head(key).await.unwrap();
		(store, object)
	}

	fn brisbane_tile() -> SynthTile {
		SynthTile {
			width: 100,
			height: 100,
			origin: (502_000.0, 6_961_000.0),
			pixel_scale: (10.0, 10.0),
			epsg: 28356,
			nodata: Some(-9999.0),
			data: gradient_data(100, 100, 30.0),
			..SynthTile::default()
		}
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn header_strategy_wins_when_readable() {
		let (store, object) = store_with("au/z56/brisbane/good.tif", brisbane_tile().encode()).await;
		let entry = Extractor::new(store).extract(&object).await;

		assert_eq!(entry.method, ExtractMethod::RasterHeader);
		assert_eq!(entry.precision, PrecisionClass::Precise);
		assert_eq!(entry.native_crs, Crs::UtmSouth { zone: 56 });
		assert_eq!(entry.width, Some(100));
		assert_eq!(entry.pixel_size_x, Some(10.0));
		assert!(entry.bounds.contains(-27.485, 153.025));
		entry.check().unwrap();
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn unreadable_header_falls_back_to_filename_grid() {
		let (store, object) = store_with(
			"au/z56/brisbane/Brisbane_2019_Prj_SW_502000_6960000_1k_DEM_1m.tif",
			vec![0xde, 0xad, 0xbe, 0xef],
		)
		.await;
		let entry = Extractor::new(store).extract(&object).await;

		assert_eq!(entry.method, ExtractMethod::FilenameGrid);
		assert_eq!(entry.precision, PrecisionClass::Precise);
		assert_eq!(entry.native_crs, Crs::UtmSouth { zone: 56 });
		assert_eq!(entry.width, None);
		entry.check().unwrap();
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn unrecognized_everything_uses_regional_fallback() {
		let (store, object) = store_with("qld/somewhere/mystery.tif", vec![1, 2, 3]).await;
		let entry = Extractor::new(store).extract(&object).await;

		assert_eq!(entry.method, ExtractMethod::RegionalFallback);
		assert_eq!(entry.precision, PrecisionClass::Regional);
		// Queensland box, not Australia-wide.
		assert!(entry.bounds.contains(-27.47, 153.02));
		assert!(!entry.bounds.contains(-35.3, 149.1));
		entry.check().unwrap();
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn header_outside_region_is_rejected() {
		// Valid GeoTIFF, but georeferenced in Europe.
		let tile = SynthTile {
			origin: (8.0, 48.0),
			pixel_scale: (0.001, 0.001),
			epsg: 4326,
			data: gradient_data(16, 16, 300.0),
			..SynthTile::default()
		};
		let (store, object) = store_with("misc/elsewhere.tif", tile.encode()).await;
		let entry = Extractor::new(store).extract(&object).await;
		assert_eq!(entry.method, ExtractMethod::RegionalFallback);
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn unknown_crs_falls_through() {
		let tile = SynthTile {
			epsg: 9999, // no transform registered
			..brisbane_tile()
		};
		let (store, object) = store_with(
			"au/z56/brisbane/Brisbane_2019_Prj_SW_502000_6960000_1k_DEM_1m.tif",
			tile.encode(),
		)
		.await;
		let entry = Extractor::new(store).extract(&object).await;
		// Header parse succeeded but could not be reprojected, so the
		// filename grid takes over.
		assert_eq!(entry.method, ExtractMethod::FilenameGrid);
	}

	#[tokio::test(flavor = "multi_thread")]
	async fn size_and_timestamp_are_carried_through() {
		let (store, object) = store_with("au/z56/brisbane/good.tif", brisbane_tile().encode()).await;
		let entry = Extractor::new(store.clone()).extract(&object).await;
		assert_eq!(entry.size_bytes, object.size);
		assert_eq!(entry.last_modified, object.last_modified);
	}
}
