//! In-memory GeoTIFF fixtures for tests.
//!
//! Synthesizes small but fully valid GeoTIFFs (geotransform, CRS geokeys,
//! nodata tag, configurable strip layout) so extractor, sampler and
//! builder tests can run against an in-memory object store without any
//! real rasters on disk.

use std::io::Cursor;
use tiff::encoder::{TiffEncoder, colortype};
use tiff::tags::Tag;

const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
const TAG_GDAL_NODATA: u16 = 42113;

/// Description of a synthetic raster tile.
pub struct SynthTile {
	pub width: u32,
	pub height: u32,
	/// Native coordinates of the outer top-left corner.
	pub origin: (f64, f64),
	/// Pixel size in native units (x, y).
	pub pixel_scale: (f64, f64),
	/// EPSG code written into the geokey directory (4326 for geographic).
	pub epsg: u16,
	pub nodata: Option<f64>,
	/// Row-major samples, `width * height` values.
	pub data: Vec<f32>,
	pub rows_per_strip: u32,
}

impl Default for SynthTile {
	fn default() -> Self {
		SynthTile {
			width: 16,
			height: 16,
			origin: (500_000.0, 6_000_000.0),
			pixel_scale: (1.0, 1.0),
			epsg: 28355,
			nodata: Some(-9999.0),
			data: gradient_data(16, 16, 0.0),
			rows_per_strip: 8,
		}
	}
}

impl SynthTile {
	/// Encodes the tile as GeoTIFF bytes.
	pub fn encode(&self) -> Vec<u8> {
		assert_eq!(
			self.data.len() as u64,
			u64::from(self.width) * u64::from(self.height),
			"sample count must match dimensions"
		);

		let mut bytes = Vec::new();
		{
			let mut encoder = TiffEncoder::new(Cursor::new(&mut bytes)).expect("in-memory TIFF encoder");
			let mut image = encoder
				.new_image::<colortype::Gray32Float>(self.width, self.height)
				.expect("new image");
			image.rows_per_strip(self.rows_per_strip).expect("strip layout");

			let scale = [self.pixel_scale.0, self.pixel_scale.1, 0.0];
			let tiepoint = [0.0, 0.0, 0.0, self.origin.0, self.origin.1, 0.0];
			image
				.encoder()
				.write_tag(Tag::Unknown(TAG_MODEL_PIXEL_SCALE), &scale[..])
				.expect("pixel scale tag");
			image
				.encoder()
				.write_tag(Tag::Unknown(TAG_MODEL_TIEPOINT), &tiepoint[..])
				.expect("tiepoint tag");
			image
				.encoder()
				.write_tag(Tag::Unknown(TAG_GEO_KEY_DIRECTORY), &self.geokeys()[..])
				.expect("geokey tag");
			if let Some(nodata) = self.nodata {
				let text = if nodata == nodata.trunc() {
					format!("{nodata:.0}")
				} else {
					format!("{nodata}")
				};
				image
					.encoder()
					.write_tag(Tag::Unknown(TAG_GDAL_NODATA), text.as_str())
					.expect("nodata tag");
			}

			image.write_data(&self.data).expect("pixel data");
		}
		bytes
	}

	fn geokeys(&self) -> Vec<u16> {
		if self.epsg == 4326 {
			// header, GTModelType=geographic, GeographicType=4326
			vec![1, 1, 0, 2, 1024, 0, 1, 2, 2048, 0, 1, 4326]
		} else {
			// header, GTModelType=projected, ProjectedCSType=<epsg>
			vec![1, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, self.epsg]
		}
	}
}

/// Row-major gradient: `value(col, row) = base + row * width + col`.
/// Every pixel is distinct, which makes wrong-strip bugs visible.
#[must_use]
pub fn gradient_data(width: u32, height: u32, base: f32) -> Vec<f32> {
	(0..height)
		.flat_map(|row| (0..width).map(move |col| base + (row * width + col) as f32))
		.collect()
}

/// Uniform surface at `value`, with optional nodata holes at the given
/// pixel positions.
#[must_use]
pub fn flat_data(width: u32, height: u32, value: f32, holes: &[(u32, u32)], nodata: f32) -> Vec<f32> {
	let mut data = vec![value; (width * height) as usize];
	for &(col, row) in holes {
		data[(row * width + col) as usize] = nodata;
	}
	data
}

// --- index model fixtures ----------------------------------------------------

use crate::model::{Campaign, Collection, SpatialIndex, TileEntry};
use demserve_core::{Bounds, Crs, DataType, ExtractMethod, PrecisionClass};
use std::collections::BTreeMap;

/// A plausible raster-header tile entry for model tests.
#[must_use]
pub fn model_tile(key: &str, bounds: Bounds, zone: u8) -> TileEntry {
	TileEntry {
		key: key.to_string(),
		filename: key.rsplit('/').next().unwrap_or(key).to_string(),
		bounds,
		native_crs: Crs::UtmSouth { zone },
		pixel_size_x: Some(1.0),
		pixel_size_y: Some(1.0),
		width: Some(1000),
		height: Some(1000),
		precision: PrecisionClass::from_area_deg2(bounds.area_deg2()),
		method: ExtractMethod::RasterHeader,
		size_bytes: 4_000_000,
		last_modified: "2024-03-01T00:00:00Z".parse().unwrap(),
	}
}

#[must_use]
pub fn model_campaign(name: &str, data_type: DataType, priority: u32, cost: f64, files: Vec<TileEntry>) -> Campaign {
	let mut campaign = Campaign {
		name: name.to_string(),
		provider: "Elvis".to_string(),
		data_type,
		resolution_m: 1.0,
		priority,
		cost_per_query: cost,
		bounds: Bounds::new(0.0, 0.0, 0.0, 0.0).unwrap(),
		campaign_year: None,
		survey_name: None,
		file_count: 0,
		files,
	};
	campaign.recompute().expect("fixture campaign must be valid");
	campaign
}

/// Grid of `nx * ny` adjacent tiles of `step` degrees starting at the
/// south-west corner `(lat0, lon0)`.
#[must_use]
pub fn tile_grid(prefix: &str, lat0: f64, lon0: f64, nx: u32, ny: u32, step: f64, zone: u8) -> Vec<TileEntry> {
	let mut tiles = Vec::new();
	for j in 0..ny {
		for i in 0..nx {
			let min_lat = lat0 + f64::from(j) * step;
			let min_lon = lon0 + f64::from(i) * step;
			let bounds = Bounds::new(min_lat, min_lat + step, min_lon, min_lon + step).unwrap();
			tiles.push(model_tile(&format!("{prefix}/tile_{i}_{j}.tif"), bounds, zone));
		}
	}
	tiles
}

/// Bounds of the south-west tile of the Brisbane fixture campaign.
#[must_use]
pub fn brisbane_sw_tile_bounds() -> Bounds {
	Bounds::new(-27.5, -27.45, 153.0, 153.05).unwrap()
}

/// A four-campaign, two-collection index with distinct geography:
/// Brisbane + Gold Coast + Sydney (AU) and Wellington (NZ LiDAR).
#[must_use]
pub fn small_index() -> SpatialIndex {
	let mut au = Collection::new("AU", "GDA94 / MGA");
	au.campaigns.insert(
		"brisbane2019_z56".to_string(),
		model_campaign(
			"Brisbane2019",
			DataType::Lidar,
			1,
			0.001,
			tile_grid("au/z56/brisbane2019", -27.5, 153.0, 2, 2, 0.05, 56),
		),
	);
	au.campaigns.insert(
		"goldcoast2020_z56".to_string(),
		model_campaign(
			"GoldCoast2020",
			DataType::Dem,
			2,
			0.001,
			tile_grid("au/z56/goldcoast2020", -28.05, 153.35, 2, 2, 0.05, 56),
		),
	);
	au.campaigns.insert(
		"sydney2020_z56".to_string(),
		model_campaign(
			"Sydney2020",
			DataType::Lidar,
			1,
			0.001,
			tile_grid("au/z56/sydney2020", -34.0, 151.0, 10, 10, 0.01, 56),
		),
	);

	let mut nz = Collection::new("NZ", "NZGD2000 / NZTM");
	let mut wellington = model_campaign(
		"wellington_2019",
		DataType::Lidar,
		1,
		0.0,
		tile_grid("nz/wellington/wellington_2019/dem_1m", -41.32, 174.72, 3, 2, 0.05, 60),
	);
	wellington.provider = "LINZ".to_string();
	wellington.survey_name = Some("wellington_2019".to_string());
	wellington.campaign_year = Some(2019);
	nz.campaigns.insert("wellington_2019_dem_1m".to_string(), wellington);

	let mut index = SpatialIndex {
		schema_version: crate::model::INDEX_SCHEMA_VERSION.to_string(),
		generated_at: "2024-06-01T00:00:00Z".parse().unwrap(),
		bucket: "test-bucket".to_string(),
		total_tile_count: 0,
		collections: vec![au, nz],
		last_incremental_update: None,
	};
	index.recompute().expect("fixture index must be valid");
	index
}

/// Convenience constructor for a one-campaign index.
#[must_use]
pub fn single_campaign_index(campaign_id: &str, campaign: Campaign) -> SpatialIndex {
	let mut collection = Collection::new("AU", "GDA94 / MGA");
	collection.campaigns = BTreeMap::from([(campaign_id.to_string(), campaign)]);
	let mut index = SpatialIndex {
		schema_version: crate::model::INDEX_SCHEMA_VERSION.to_string(),
		generated_at: "2024-06-01T00:00:00Z".parse().unwrap(),
		bucket: "test-bucket".to_string(),
		total_tile_count: 0,
		collections: vec![collection],
		last_incremental_update: None,
	};
	index.recompute().expect("fixture index must be valid");
	index
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn encoded_tile_is_a_valid_tiff() {
		let bytes = SynthTile::default().encode();
		// Little-endian TIFF magic.
		assert_eq!(&bytes[..4], &[0x49, 0x49, 42, 0]);
		assert!(bytes.len() > 16 * 16 * 4);
	}

	#[test]
	fn gradient_values_are_distinct() {
		let data = gradient_data(4, 4, 10.0);
		assert_eq!(data[0], 10.0);
		assert_eq!(data[15], 25.0);
	}

	#[test]
	fn flat_data_places_holes() {
		let data = flat_data(4, 4, 5.0, &[(1, 2)], -1.0);
		assert_eq!(data[2 * 4 + 1], -1.0);
		assert_eq!(data[0], 5.0);
	}
}
