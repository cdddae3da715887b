use crate::types::Bounds;
use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display};
use std::str::FromStr;

/// Region envelope covering the AU + NZ corpora. Extractor output whose
/// bounds fall outside this envelope is treated as suspect.
pub const REGION_ENVELOPE: Bounds = Bounds {
	min_lat: -50.0,
	max_lat: -8.0,
	min_lon: 110.0,
	max_lon: 180.0,
};

/// Coordinate reference system of a raster tile.
///
/// Only the systems that actually occur in the corpus are modeled:
/// geographic WGS84/GDA, UTM-style transverse-mercator zones (MGA94,
/// MGA2020, WGS84/UTM) and NZTM2000. Anything else is carried as an
/// opaque string so the original tag is preserved in the index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Crs {
	/// Geographic latitude/longitude (EPSG:4326 and the GDA geographic
	/// variants, which are indistinguishable at our precision).
	Wgs84,
	/// A southern-hemisphere transverse-mercator zone (MGA/UTM).
	UtmSouth { zone: u8 },
	/// New Zealand Transverse Mercator 2000 (EPSG:2193).
	Nztm2000,
	/// Unrecognized system, kept verbatim.
	Other(String),
}

impl Crs {
	/// Whether a transform to and from WGS84 is available.
	#[must_use]
	pub fn is_transformable(&self) -> bool {
		!matches!(self, Crs::Other(_))
	}

	/// EPSG-style authority code, where one exists.
	#[must_use]
	pub fn code(&self) -> String {
		match self {
			Crs::Wgs84 => "EPSG:4326".to_string(),
			Crs::UtmSouth { zone } => format!("EPSG:{}", 28300 + u32::from(*zone)),
			Crs::Nztm2000 => "EPSG:2193".to_string(),
			Crs::Other(s) => s.clone(),
		}
	}
}

impl FromStr for Crs {
	type Err = anyhow::Error;

	fn from_str(input: &str) -> Result<Self> {
		let s = input.trim();
		let upper = s.to_ascii_uppercase();
		let code = upper.strip_prefix("EPSG:").unwrap_or(&upper);
		Ok(match code {
			"4326" | "4283" | "7844" | "WGS84" | "WGS 84" => Crs::Wgs84,
			"2193" | "NZTM2000" | "NZTM" => Crs::Nztm2000,
			_ => {
				if let Ok(n) = code.parse::<u32>() {
					match n {
						// GDA94 / MGA zones 46..59
						28346..=28359 => Crs::UtmSouth { zone: (n - 28300) as u8 },
						// GDA2020 / MGA zones 46..59
						7846..=7859 => Crs::UtmSouth { zone: (n - 7800) as u8 },
						// WGS84 / UTM south zones 1..60
						32701..=32760 => Crs::UtmSouth { zone: (n - 32700) as u8 },
						_ => Crs::Other(s.to_string()),
					}
				} else {
					Crs::Other(s.to_string())
				}
			}
		})
	}
}

impl Display for Crs {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.code())
	}
}

impl Serialize for Crs {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.code())
	}
}

impl<'de> Deserialize<'de> for Crs {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		Crs::from_str(&s).map_err(serde::de::Error::custom)
	}
}

/// Coarse shape classification of a bounding box, used to screen
/// malformed extractor output before it reaches the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsFamily {
	/// Components are plausible degrees inside the AU/NZ envelope.
	Wgs84,
	/// Components look like metric eastings/northings.
	UtmLike,
	/// Neither; the values are garbage.
	Invalid,
}

/// Classifies the four components of `bounds`-shaped raw values. Unlike
/// [`Bounds`], the inputs here are unvalidated numbers straight from an
/// extractor, so degree-range checks cannot be assumed.
#[must_use]
pub fn detect_crs_family(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> CrsFamily {
	let degreeish = (-90.0..=90.0).contains(&min_lat)
		&& (-90.0..=90.0).contains(&max_lat)
		&& (-180.0..=180.0).contains(&min_lon)
		&& (-180.0..=180.0).contains(&max_lon);
	if degreeish {
		let e = REGION_ENVELOPE;
		let inside = min_lat >= e.min_lat && max_lat <= e.max_lat && min_lon >= e.min_lon && max_lon <= e.max_lon;
		return if inside { CrsFamily::Wgs84 } else { CrsFamily::Invalid };
	}

	// Metric easting/northing ranges: eastings ~1e5..1e6 (NZTM up to 2e6),
	// southern-hemisphere false northings ~1e6..1e7.
	let easting_like = |v: f64| (100_000.0..=2_100_000.0).contains(&v);
	let northing_like = |v: f64| (1_000_000.0..=10_100_000.0).contains(&v);
	if easting_like(min_lon) && easting_like(max_lon) && northing_like(min_lat) && northing_like(max_lat) {
		CrsFamily::UtmLike
	} else {
		CrsFamily::Invalid
	}
}
