//! Grid-reference filename parsing.
//!
//! Several AU campaigns encode a UTM zone and a 1 km grid origin in the
//! tile filename. When a raster header cannot be read, these patterns
//! recover usable bounds: the tile is treated as a 1 km square centered
//! on the decoded cell and reprojected to WGS84.

use demserve_core::Bounds;
use demserve_core::geo::TmProjection;
use lazy_static::lazy_static;
use regex::Regex;

/// Central northing of the populated band of each AU zone, used when a
/// pattern does not encode a northing.
fn zone_base_northing(zone: u8) -> f64 {
	match zone {
		54 => 7_200_000.0,
		55 => 6_200_000.0,
		56 => 6_800_000.0,
		_ => 6_500_000.0,
	}
}

/// Central easting per zone, used when a pattern only encodes a northing.
fn zone_base_easting(zone: u8) -> f64 {
	match zone {
		54 => 400_000.0,
		55 => 500_000.0,
		56 => 600_000.0,
		_ => 500_000.0,
	}
}

/// A decoded 1 km grid cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridRef {
	/// Center of the cell, in zone coordinates.
	pub easting: f64,
	pub northing: f64,
	pub zone: u8,
	pub tile_size_m: f64,
}

impl GridRef {
	/// WGS84 bounds of the cell: the four corners of the square are
	/// unprojected and the axis-aligned hull taken.
	pub fn to_bounds(&self) -> anyhow::Result<Bounds> {
		let half = self.tile_size_m / 2.0;
		let projection = TmProjection::utm_south(self.zone);
		let corners = [
			(self.easting - half, self.northing - half),
			(self.easting + half, self.northing - half),
			(self.easting + half, self.northing + half),
			(self.easting - half, self.northing + half),
		];
		let mut lats = [0.0; 4];
		let mut lons = [0.0; 4];
		for (i, (e, n)) in corners.into_iter().enumerate() {
			let (lat, lon) = projection.inverse(e, n);
			lats[i] = lat;
			lons[i] = lon;
		}
		Bounds::from_corners(&lats, &lons)
	}
}

lazy_static! {
	// WaggaWaggaLidar2009-DTM-GRID-001_4806126_55_0002_0002.tif
	static ref RE_DTM_GRID: Regex = Regex::new(r"DTM-GRID-\d+_(\d{7})_(\d{2})_\d+_\d+").unwrap();
	// Clarence2019-DEM-1m_5275257_GDA2020_55.tif
	static ref RE_GRID_REFERENCE: Regex = Regex::new(r"[A-Za-z]+\d{4}-DEM-1m_(\d{7})_GDA2020_(\d{2})\.tiff?$").unwrap();
	// Brisbane_2019_Prj_SW_465000_6970000_1k_DEM_1m.tif
	static ref RE_SW_ORIGIN: Regex = Regex::new(r"SW_(\d+)_(\d+)_1[kK]_DEM_1m\.tiff?$").unwrap();
	// ACT2015_4ppm_6586070_55_0002_0002_1m.tif
	static ref RE_ZONE_EASTING: Regex = Regex::new(r"_(\d{7})_(\d{2})_\d{4}_\d{4}").unwrap();
	// Catch-all: a 6-7 digit coordinate next to a zone field.
	static ref RE_COORD_ZONE: Regex = Regex::new(r"_(\d{6,7})_(\d{2})_").unwrap();
}

/// Decodes a recognized grid pattern, or `None`. Patterns are tried from
/// most to least specific; the DTM-GRID form must run before the generic
/// seven-digit form that would misread it.
#[must_use]
pub fn parse_grid_filename(filename: &str) -> Option<GridRef> {
	if let Some(caps) = RE_DTM_GRID.captures(filename) {
		// EEENNMM: easting km, then northing-tile-100 and northing-tile-10.
		let digits = &caps[1];
		let zone: u8 = caps[2].parse().ok()?;
		let easting_km: f64 = digits[..3].parse().ok()?;
		let n100: f64 = digits[3..5].parse().ok()?;
		let n10: f64 = digits[5..7].parse().ok()?;
		return Some(GridRef {
			easting: easting_km * 1000.0 + 500.0,
			northing: zone_base_northing(zone) + n100 * 1000.0 + n10 * 10.0,
			zone,
			tile_size_m: 1000.0,
		});
	}

	if let Some(caps) = RE_GRID_REFERENCE.captures(filename) {
		let digits = &caps[1];
		let zone: u8 = caps[2].parse().ok()?;
		let easting_km: f64 = digits[..3].parse().ok()?;
		let offset: f64 = digits[3..7].parse().ok()?;
		// Zone-specific northing reconstruction from the 4-digit offset.
		let northing = match zone {
			55 if offset < 3000.0 => 6_700_000.0 + offset * 100.0 + 50.0,
			55 => 6_700_000.0 + offset * 10.0 + 500.0,
			56 => 6_900_000.0 + offset * 10.0 + 500.0,
			_ => zone_base_northing(zone),
		};
		return Some(GridRef {
			easting: easting_km * 1000.0 + 500.0,
			northing,
			zone,
			tile_size_m: 1000.0,
		});
	}

	if let Some(caps) = RE_SW_ORIGIN.captures(filename) {
		let easting: f64 = caps[1].parse().ok()?;
		let northing: f64 = caps[2].parse().ok()?;
		// The filename gives the SW corner directly; zone is inferred
		// from the easting band.
		let zone = if (400_000.0..600_000.0).contains(&easting) { 56 } else { 55 };
		return Some(GridRef {
			easting: easting + 500.0,
			northing: northing + 500.0,
			zone,
			tile_size_m: 1000.0,
		});
	}

	if let Some(caps) = RE_ZONE_EASTING.captures(filename) {
		// The seven-digit field is the easting scaled by ten; the
		// northing is not encoded and comes from the zone's central band.
		let field: f64 = caps[1].parse().ok()?;
		let zone: u8 = caps[2].parse().ok()?;
		let easting_km = (field / 10_000.0).floor();
		return Some(GridRef {
			easting: easting_km * 1000.0 + 500.0,
			northing: zone_base_northing(zone),
			zone,
			tile_size_m: 1000.0,
		});
	}

	if let Some(caps) = RE_COORD_ZONE.captures(filename) {
		let value: f64 = caps[1].parse().ok()?;
		let zone: u8 = caps[2].parse().ok()?;
		if (100_000.0..=900_000.0).contains(&value) {
			return Some(GridRef {
				easting: value + 500.0,
				northing: zone_base_northing(zone),
				zone,
				tile_size_m: 1000.0,
			});
		}
		if (1_000_000.0..=9_900_000.0).contains(&value) {
			return Some(GridRef {
				easting: zone_base_easting(zone),
				northing: value + 500.0,
				zone,
				tile_size_m: 1000.0,
			});
		}
	}

	None
}
