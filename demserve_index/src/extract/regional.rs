//! Last-resort regional bounds derived from path substrings.
//!
//! When neither the raster header nor the filename yields coordinates,
//! the object path usually still names a state or survey area. The
//! resulting boxes are deliberately coarse and always carry precision
//! class `regional`.

use demserve_core::Bounds;

/// Coarse state/region box for a path, with the matched region name.
/// Never fails; unrecognized paths get the Australia-wide box.
#[must_use]
pub fn regional_bounds(path: &str) -> (Bounds, &'static str) {
	let lower = path.to_ascii_lowercase();
	let hit = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

	let (name, b) = if hit(&["act", "canberra"]) {
		("act", (-35.9, -35.1, 148.9, 149.4))
	} else if hit(&["clarence", "richmond"]) {
		("clarence", (-29.0, -25.0, 151.0, 154.0))
	} else if hit(&["qld", "queensland", "brisbane"]) {
		("qld", (-29.2, -9.0, 137.9, 153.6))
	} else if hit(&["nsw", "sydney"]) {
		("nsw", (-37.5, -28.0, 140.9, 153.6))
	} else if hit(&["vic", "melbourne"]) {
		("vic", (-39.2, -33.9, 140.9, 150.0))
	} else if hit(&["tas", "tasmania", "hobart"]) {
		("tas", (-43.6, -39.6, 143.8, 148.5))
	} else if hit(&["nt_", "/nt/", "darwin"]) {
		("nt", (-26.0, -10.9, 129.0, 138.0))
	} else if hit(&["wa_", "/wa/", "perth"]) {
		("wa", (-35.2, -13.6, 112.9, 129.0))
	} else if hit(&["sa_", "/sa/", "adelaide"]) {
		("sa", (-38.1, -25.9, 129.0, 141.0))
	} else if hit(&["nz", "zealand"]) {
		("nz", (-47.5, -34.0, 166.0, 179.0))
	} else {
		("australia", (-44.0, -9.0, 112.0, 154.0))
	};

	let bounds = Bounds::new(b.0, b.1, b.2, b.3).expect("regional boxes are hard-coded valid");
	(bounds, name)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("act-elvis/canberra/tile.tif", "act")]
	#[case("qld/brisbane-2014/tile.tif", "qld")]
	#[case("ClarenceRiver2023/tile.tif", "clarence")]
	#[case("nsw-elvis/unknown/tile.tif", "nsw")]
	#[case("tasmania/launceston/tile.tif", "tas")]
	#[case("mystery/path/tile.tif", "australia")]
	fn region_from_path(#[case] path: &str, #[case] expected: &str) {
		let (_, name) = regional_bounds(path);
		assert_eq!(name, expected);
	}

	#[test]
	fn every_region_is_regional_precision() {
		use demserve_core::PrecisionClass;
		for path in ["act/x.tif", "qld/x.tif", "nsw/x.tif", "whatever/x.tif"] {
			let (bounds, _) = regional_bounds(path);
			assert_eq!(
				PrecisionClass::from_area_deg2(bounds.area_deg2()),
				PrecisionClass::Regional
			);
		}
	}

	#[test]
	fn act_beats_the_broader_nsw_match() {
		// ACT paths often also contain "nsw"; the specific region wins.
		let (_, name) = regional_bounds("nsw/act-elvis/tile.tif");
		assert_eq!(name, "act");
	}
}
