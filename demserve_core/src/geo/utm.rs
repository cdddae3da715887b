//! Transverse-mercator projection math on the WGS84 ellipsoid.
//!
//! Implements the standard series expansions in both directions, good to
//! well under a meter inside a zone. The same projection core serves the
//! MGA/UTM southern zones and NZTM2000, which differ only in central
//! meridian and false origin.

// WGS84 ellipsoid
const A: f64 = 6_378_137.0;
const F: f64 = 1.0 / 298.257_223_563;
const K0: f64 = 0.9996;

/// A parameterized transverse-mercator projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TmProjection {
	pub central_meridian_deg: f64,
	pub false_easting: f64,
	pub false_northing: f64,
}

impl TmProjection {
	/// Southern-hemisphere UTM/MGA zone.
	#[must_use]
	pub fn utm_south(zone: u8) -> TmProjection {
		TmProjection {
			central_meridian_deg: f64::from(zone) * 6.0 - 183.0,
			false_easting: 500_000.0,
			false_northing: 10_000_000.0,
		}
	}

	/// New Zealand Transverse Mercator 2000 (EPSG:2193).
	#[must_use]
	pub fn nztm2000() -> TmProjection {
		TmProjection {
			central_meridian_deg: 173.0,
			false_easting: 1_600_000.0,
			false_northing: 10_000_000.0,
		}
	}

	/// Projects geographic coordinates to `(easting, northing)`.
	#[must_use]
	pub fn forward(&self, lat_deg: f64, lon_deg: f64) -> (f64, f64) {
		let e2 = 2.0 * F - F * F;
		let ep2 = e2 / (1.0 - e2);

		let phi = lat_deg.to_radians();
		let dlam = (lon_deg - self.central_meridian_deg).to_radians();

		let sin_phi = phi.sin();
		let cos_phi = phi.cos();
		let tan_phi = phi.tan();

		let n = A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
		let t = tan_phi * tan_phi;
		let c = ep2 * cos_phi * cos_phi;
		let a_term = dlam * cos_phi;

		let m = meridional_arc(phi);

		let easting = K0
			* n * (a_term
			+ (1.0 - t + c) * a_term.powi(3) / 6.0
			+ (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a_term.powi(5) / 120.0)
			+ self.false_easting;

		let northing = K0
			* (m + n
				* tan_phi * (a_term * a_term / 2.0
				+ (5.0 - t + 9.0 * c + 4.0 * c * c) * a_term.powi(4) / 24.0
				+ (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a_term.powi(6) / 720.0))
			+ self.false_northing;

		(easting, northing)
	}

	/// Unprojects `(easting, northing)` to `(lat, lon)` in degrees.
	#[must_use]
	pub fn inverse(&self, easting: f64, northing: f64) -> (f64, f64) {
		let e2 = 2.0 * F - F * F;
		let ep2 = e2 / (1.0 - e2);

		let x = easting - self.false_easting;
		let y = northing - self.false_northing;

		let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());
		let m = y / K0;
		let mu = m / (A * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2.powi(3) / 256.0));

		// Footprint latitude
		let phi1 = mu
			+ (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
			+ (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
			+ (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin();

		let sin_phi1 = phi1.sin();
		let cos_phi1 = phi1.cos();
		let tan_phi1 = phi1.tan();

		let n1 = A / (1.0 - e2 * sin_phi1 * sin_phi1).sqrt();
		let t1 = tan_phi1 * tan_phi1;
		let c1 = ep2 * cos_phi1 * cos_phi1;
		let r1 = A * (1.0 - e2) / (1.0 - e2 * sin_phi1 * sin_phi1).powf(1.5);
		let d = x / (n1 * K0);

		let lat = phi1
			- (n1 * tan_phi1 / r1)
				* (d * d / 2.0
					- (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
					+ (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1) * d.powi(6)
						/ 720.0);

		let lon = self.central_meridian_deg.to_radians()
			+ (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
				+ (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d.powi(5) / 120.0)
				/ cos_phi1;

		(lat.to_degrees(), lon.to_degrees())
	}
}

/// Meridional arc length from the equator to latitude `phi` (radians).
fn meridional_arc(phi: f64) -> f64 {
	let e2 = 2.0 * F - F * F;
	A * ((1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2.powi(3) / 256.0) * phi
		- (3.0 * e2 / 8.0 + 3.0 * e2 * e2 / 32.0 + 45.0 * e2.powi(3) / 1024.0) * (2.0 * phi).sin()
		+ (15.0 * e2 * e2 / 256.0 + 45.0 * e2.powi(3) / 1024.0) * (4.0 * phi).sin()
		- (35.0 * e2.powi(3) / 3072.0) * (6.0 * phi).sin())
}

/// UTM zone number covering the given longitude.
#[must_use]
pub fn utm_zone_for_lon(lon: f64) -> u8 {
	(((lon + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u8
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_abs_diff_eq;
	use rstest::rstest;

	#[test]
	fn false_origin_maps_to_central_meridian_equator() {
		let p = TmProjection::utm_south(55);
		let (lat, lon) = p.inverse(500_000.0, 10_000_000.0);
		assert_abs_diff_eq!(lat, 0.0, epsilon = 1e-9);
		assert_abs_diff_eq!(lon, 147.0, epsilon = 1e-9);
	}

	#[rstest]
	#[case(-27.4698, 153.0251, 56)] // Brisbane
	#[case(-35.2809, 149.1300, 55)] // Canberra
	#[case(-42.8821, 147.3272, 55)] // Hobart
	#[case(-31.9523, 115.8613, 50)] // Perth
	fn utm_round_trip(#[case] lat: f64, #[case] lon: f64, #[case] zone: u8) {
		let p = TmProjection::utm_south(zone);
		let (e, n) = p.forward(lat, lon);
		assert!((100_000.0..900_000.0).contains(&e), "easting {e}");
		assert!((0.0..10_000_000.0).contains(&n), "northing {n}");
		let (lat2, lon2) = p.inverse(e, n);
		assert_abs_diff_eq!(lat, lat2, epsilon = 1e-7);
		assert_abs_diff_eq!(lon, lon2, epsilon = 1e-7);
	}

	#[test]
	fn easting_grows_east_of_central_meridian() {
		let p = TmProjection::utm_south(56);
		let (east_of, _) = p.forward(-27.5, 153.5); // CM of zone 56 is 153
		let (west_of, _) = p.forward(-27.5, 152.5);
		assert!(east_of > 500_000.0);
		assert!(west_of < 500_000.0);
	}

	#[test]
	fn nztm_round_trip_wellington() {
		let p = TmProjection::nztm2000();
		let (e, n) = p.forward(-41.2865, 174.7762);
		assert!((1_000_000.0..2_100_000.0).contains(&e), "easting {e}");
		assert!((4_700_000.0..6_300_000.0).contains(&n), "northing {n}");
		let (lat, lon) = p.inverse(e, n);
		assert_abs_diff_eq!(lat, -41.2865, epsilon = 1e-7);
		assert_abs_diff_eq!(lon, 174.7762, epsilon = 1e-7);
	}

	#[rstest]
	#[case(153.0251, 56)]
	#[case(147.0, 55)] // central meridian sits inside its own zone
	#[case(115.8613, 50)]
	#[case(174.7762, 60)]
	#[case(-180.0, 1)]
	#[case(180.0, 60)]
	fn zone_for_lon(#[case] lon: f64, #[case] expected: u8) {
		assert_eq!(utm_zone_for_lon(lon), expected);
	}
}
