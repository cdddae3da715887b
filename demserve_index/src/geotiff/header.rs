use anyhow::{Context, Result, bail, ensure};
use demserve_core::geo::bbox_to_wgs84;
use demserve_core::{Bounds, Crs, ExtractError};
use std::io::{Read, Seek};
use std::str::FromStr;
use tiff::decoder::Decoder;
use tiff::tags::Tag;

// GeoTIFF tag numbers.
const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_MODEL_TRANSFORMATION: u16 = 34264;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
const TAG_GDAL_NODATA: u16 = 42113;

// GeoKey ids within the directory.
const KEY_GT_MODEL_TYPE: u64 = 1024;
const KEY_GEOGRAPHIC_TYPE: u64 = 2048;
const KEY_PROJECTED_CS_TYPE: u64 = 3072;

/// Georeferencing metadata of one raster, read from tags only.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterHeader {
	pub width: u32,
	pub height: u32,
	/// Ground size of one pixel in native units (x, y), both positive.
	pub pixel_scale: (f64, f64),
	/// Native coordinates of the outer top-left corner.
	pub origin: (f64, f64),
	pub crs: Crs,
	pub nodata: Option<f64>,
}

impl RasterHeader {
	/// Reads dimensions, geotransform, CRS geokeys and the nodata tag.
	/// Pixel data is not touched.
	pub fn read_from<R: Read + Seek>(reader: R) -> Result<RasterHeader> {
		let mut decoder = Decoder::new(reader).context("not a readable TIFF")?;
		let (width, height) = decoder.dimensions().context("missing image dimensions")?;
		ensure!(width > 0 && height > 0, "degenerate raster: {width}x{height}");

		let (pixel_scale, origin) = read_geotransform(&mut decoder)?;
		let crs = read_crs(&mut decoder);
		let nodata = decoder
			.get_tag_ascii_string(Tag::Unknown(TAG_GDAL_NODATA))
			.ok()
			.and_then(|s| s.trim().trim_end_matches('\0').parse::<f64>().ok());

		Ok(RasterHeader {
			width,
			height,
			pixel_scale,
			origin,
			crs,
			nodata,
		})
	}

	/// Native-CRS bounding box `(min_x, min_y, max_x, max_y)`.
	#[must_use]
	pub fn native_bbox(&self) -> (f64, f64, f64, f64) {
		let (sx, sy) = self.pixel_scale;
		let (ox, oy) = self.origin;
		(
			ox,
			oy - f64::from(self.height) * sy,
			ox + f64::from(self.width) * sx,
			oy,
		)
	}

	/// WGS84 bounds, reprojecting the four native corners when needed.
	pub fn bounds_wgs84(&self) -> Result<Bounds, ExtractError> {
		let (min_x, min_y, max_x, max_y) = self.native_bbox();
		bbox_to_wgs84(min_x, min_y, max_x, max_y, &self.crs)
	}

	/// Pixel `(col, row)` containing the native coordinate `(x, y)`, or
	/// `None` when the coordinate falls outside the raster.
	#[must_use]
	pub fn pixel_for(&self, x: f64, y: f64) -> Option<(u32, u32)> {
		let (sx, sy) = self.pixel_scale;
		let (ox, oy) = self.origin;
		let col = ((x - ox) / sx).floor();
		let row = ((oy - y) / sy).floor();
		if col < 0.0 || row < 0.0 || col >= f64::from(self.width) || row >= f64::from(self.height) {
			return None;
		}
		Some((col as u32, row as u32))
	}
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<((f64, f64), (f64, f64))> {
	let tiepoint = decoder.get_tag_f64_vec(Tag::Unknown(TAG_MODEL_TIEPOINT));
	let scale = decoder.get_tag_f64_vec(Tag::Unknown(TAG_MODEL_PIXEL_SCALE));

	if let (Ok(tiepoint), Ok(scale)) = (tiepoint, scale) {
		ensure!(tiepoint.len() >= 6, "ModelTiepoint has {} values, need 6", tiepoint.len());
		ensure!(scale.len() >= 2, "ModelPixelScale has {} values, need 2", scale.len());
		let (sx, sy) = (scale[0].abs(), scale[1].abs());
		ensure!(sx > 0.0 && sy > 0.0, "zero pixel scale");
		// Tiepoint maps pixel (i, j) to geo (x, y); shift to pixel (0, 0).
		let origin_x = tiepoint[3] - tiepoint[0] * sx;
		let origin_y = tiepoint[4] + tiepoint[1] * sy;
		return Ok(((sx, sy), (origin_x, origin_y)));
	}

	// Older writers store a full 4x4 affine instead.
	if let Ok(m) = decoder.get_tag_f64_vec(Tag::Unknown(TAG_MODEL_TRANSFORMATION)) {
		ensure!(m.len() >= 16, "ModelTransformation has {} values, need 16", m.len());
		ensure!(
			m[1] == 0.0 && m[4] == 0.0,
			"rotated rasters are not supported (transformation {m:?})"
		);
		let (sx, sy) = (m[0].abs(), m[5].abs());
		ensure!(sx > 0.0 && sy > 0.0, "zero pixel scale in transformation");
		return Ok(((sx, sy), (m[3], m[7])));
	}

	bail!("no geotransform tags (ModelTiepoint/ModelPixelScale or ModelTransformation)")
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Crs {
	let Ok(directory) = decoder.get_tag_u64_vec(Tag::Unknown(TAG_GEO_KEY_DIRECTORY)) else {
		return Crs::Other("no-geokeys".to_string());
	};
	if directory.len() < 4 {
		return Crs::Other("truncated-geokeys".to_string());
	}

	let mut model_type = None;
	let mut geographic = None;
	let mut projected = None;
	for entry in directory[4..].chunks_exact(4) {
		let (key, location, value) = (entry[0], entry[1], entry[3]);
		if location != 0 {
			continue; // value lives in another tag; none of our keys do
		}
		match key {
			KEY_GT_MODEL_TYPE => model_type = Some(value),
			KEY_GEOGRAPHIC_TYPE => geographic = Some(value),
			KEY_PROJECTED_CS_TYPE => projected = Some(value),
			_ => {}
		}
	}

	match (projected, geographic, model_type) {
		(Some(code), _, _) => Crs::from_str(&format!("EPSG:{code}")).unwrap_or(Crs::Other(format!("EPSG:{code}"))),
		(None, Some(code), _) => Crs::from_str(&format!("EPSG:{code}")).unwrap_or(Crs::Other(format!("EPSG:{code}"))),
		(None, None, Some(2)) => Crs::Wgs84,
		_ => Crs::Other("no-crs-geokey".to_string()),
	}
}
