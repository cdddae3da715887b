//! Point and bounding-box reprojection between WGS84 and the projected
//! systems in the corpus.
//!
//! Bounding boxes are reprojected by transforming the four corners and
//! taking the axis-aligned hull of the result, so the output box always
//! covers the input area (it may slightly over-cover near zone edges).

use crate::error::ExtractError;
use crate::geo::utm::TmProjection;
use crate::types::{Bounds, Crs};
use anyhow::Result;

fn projection_for(crs: &Crs) -> Result<Option<TmProjection>, ExtractError> {
	match crs {
		Crs::Wgs84 => Ok(None),
		Crs::UtmSouth { zone } => Ok(Some(TmProjection::utm_south(*zone))),
		Crs::Nztm2000 => Ok(Some(TmProjection::nztm2000())),
		Crs::Other(tag) => Err(ExtractError::ReprojectionUnavailable(tag.clone())),
	}
}

/// Transforms a native `(x, y)` coordinate to `(lat, lon)`.
///
/// For geographic CRSs `x` is longitude and `y` is latitude, matching
/// raster geotransform axis order.
pub fn point_to_wgs84(x: f64, y: f64, crs: &Crs) -> Result<(f64, f64), ExtractError> {
	Ok(match projection_for(crs)? {
		None => (y, x),
		Some(p) => p.inverse(x, y),
	})
}

/// Transforms `(lat, lon)` to the native `(x, y)` of `crs`.
pub fn point_from_wgs84(lat: f64, lon: f64, crs: &Crs) -> Result<(f64, f64), ExtractError> {
	Ok(match projection_for(crs)? {
		None => (lon, lat),
		Some(p) => p.forward(lat, lon),
	})
}

/// Axis-aligned WGS84 hull of a native-CRS rectangle.
pub fn bbox_to_wgs84(min_x: f64, min_y: f64, max_x: f64, max_y: f64, crs: &Crs) -> Result<Bounds, ExtractError> {
	let corners = [
		(min_x, min_y),
		(max_x, min_y),
		(max_x, max_y),
		(min_x, max_y),
	];
	let mut lats = [0.0; 4];
	let mut lons = [0.0; 4];
	for (i, (x, y)) in corners.into_iter().enumerate() {
		let (lat, lon) = point_to_wgs84(x, y, crs)?;
		lats[i] = lat;
		lons[i] = lon;
	}
	Bounds::from_corners(&lats, &lons).map_err(|e| ExtractError::OutsideExpectedRegion(e.to_string()))
}

/// Native-CRS hull of a WGS84 box: `(min_x, min_y, max_x, max_y)`.
pub fn bbox_from_wgs84(bounds: &Bounds, crs: &Crs) -> Result<(f64, f64, f64, f64), ExtractError> {
	let corners = [
		(bounds.min_lat, bounds.min_lon),
		(bounds.min_lat, bounds.max_lon),
		(bounds.max_lat, bounds.max_lon),
		(bounds.max_lat, bounds.min_lon),
	];
	let mut min_x = f64::INFINITY;
	let mut min_y = f64::INFINITY;
	let mut max_x = f64::NEG_INFINITY;
	let mut max_y = f64::NEG_INFINITY;
	for (lat, lon) in corners {
		let (x, y) = point_from_wgs84(lat, lon, crs)?;
		min_x = min_x.min(x);
		min_y = min_y.min(y);
		max_x = max_x.max(x);
		max_y = max_y.max(y);
	}
	Ok((min_x, min_y, max_x, max_y))
}

/// Reprojects an axis-aligned rectangle from `src` to `dst` through the
/// four corners, returning `(min_x, min_y, max_x, max_y)` in `dst`.
pub fn reproject_bbox(
	min_x: f64,
	min_y: f64,
	max_x: f64,
	max_y: f64,
	src: &Crs,
	dst: &Crs,
) -> Result<(f64, f64, f64, f64), ExtractError> {
	let wgs = bbox_to_wgs84(min_x, min_y, max_x, max_y, src)?;
	if *dst == Crs::Wgs84 {
		return Ok((wgs.min_lon, wgs.min_lat, wgs.max_lon, wgs.max_lat));
	}
	bbox_from_wgs84(&wgs, dst)
}
