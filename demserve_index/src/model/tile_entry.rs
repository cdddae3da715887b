use anyhow::{Result, ensure};
use chrono::{DateTime, Utc};
use demserve_core::{Bounds, Crs, ExtractMethod, PrecisionClass};
use serde::{Deserialize, Serialize};

/// One raster file in object storage, as recorded in the index.
///
/// Entries are immutable: re-extraction and incremental updates replace
/// them wholesale instead of mutating fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileEntry {
	pub key: String,
	pub filename: String,
	pub bounds: Bounds,
	pub native_crs: Crs,
	pub pixel_size_x: Option<f64>,
	pub pixel_size_y: Option<f64>,
	pub width: Option<u32>,
	pub height: Option<u32>,
	pub precision: PrecisionClass,
	pub method: ExtractMethod,
	pub size_bytes: u64,
	pub last_modified: DateTime<Utc>,
}

impl TileEntry {
	/// Checks the entry's internal invariants: valid non-empty bounds and
	/// a precision class consistent with the bounds area and method.
	pub fn check(&self) -> Result<()> {
		self.bounds.validate()?;
		ensure!(
			self.bounds.area_deg2() > 0.0,
			"tile '{}' has empty bounds {:?}",
			self.key,
			self.bounds
		);
		if self.method == ExtractMethod::RegionalFallback {
			ensure!(
				self.precision == PrecisionClass::Regional,
				"tile '{}' uses regional fallback but claims precision '{}'",
				self.key,
				self.precision
			);
		}
		if self.precision != PrecisionClass::Regional {
			let derived = PrecisionClass::from_area_deg2(self.bounds.area_deg2());
			ensure!(
				derived == self.precision,
				"tile '{}' declares precision '{}' but its area {} deg2 classifies as '{}'",
				self.key,
				self.precision,
				self.bounds.area_deg2(),
				derived
			);
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn entry() -> TileEntry {
		TileEntry {
			key: "au/z56/Brisbane_2019_Prj_SW_502000_6960000_1k_DEM_1m.tif".to_string(),
			filename: "Brisbane_2019_Prj_SW_502000_6960000_1k_DEM_1m.tif".to_string(),
			bounds: Bounds::new(-27.49, -27.481, 153.02, 153.031).unwrap(),
			native_crs: Crs::UtmSouth { zone: 56 },
			pixel_size_x: Some(1.0),
			pixel_size_y: Some(1.0),
			width: Some(1000),
			height: Some(1000),
			precision: PrecisionClass::Precise,
			method: ExtractMethod::RasterHeader,
			size_bytes: 4_000_000,
			last_modified: "2024-03-01T00:00:00Z".parse().unwrap(),
		}
	}

	#[test]
	fn valid_entry_checks_out() {
		entry().check().unwrap();
	}

	#[test]
	fn precision_must_match_area() {
		let mut bad = entry();
		bad.precision = PrecisionClass::Reasonable;
		assert!(bad.check().is_err());
	}

	#[test]
	fn regional_method_requires_regional_precision() {
		let mut bad = entry();
		bad.method = ExtractMethod::RegionalFallback;
		assert!(bad.check().is_err());
	}

	#[test]
	fn serde_shape_has_normative_fields() {
		let json = serde_json::to_value(entry()).unwrap();
		for field in [
			"key",
			"filename",
			"bounds",
			"native_crs",
			"pixel_size_x",
			"pixel_size_y",
			"width",
			"height",
			"precision",
			"method",
			"size_bytes",
			"last_modified",
		] {
			assert!(json.get(field).is_some(), "missing field '{field}'");
		}
		assert_eq!(json["method"], "raster-header");
		assert_eq!(json["precision"], "precise");
	}
}
