use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// An axis-aligned WGS84 bounding box defined by minimum and maximum
/// latitude and longitude in decimal degrees.
///
/// Invariants enforced on construction:
/// - `min_lat <= max_lat` and `min_lon <= max_lon`
/// - latitudes lie in `[-90, 90]`, longitudes in `[-180, 180]`
///
/// Containment is inclusive on all four edges: a point exactly on a
/// boundary belongs to the box.
///
/// # Examples
///
/// ```
/// use demserve_core::Bounds;
///
/// let b = Bounds::new(-28.0, -27.0, 152.0, 153.5).unwrap();
/// assert!(b.contains(-27.4698, 153.0251));
/// assert!(b.contains(-28.0, 152.0)); // edges are inclusive
/// assert_eq!(b.area_deg2(), 1.5);
/// ```
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
	pub min_lat: f64,
	pub max_lat: f64,
	pub min_lon: f64,
	pub max_lon: f64,
}

impl Bounds {
	/// Creates a new `Bounds`, validating ranges and ordering.
	pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Bounds> {
		Bounds {
			min_lat,
			max_lat,
			min_lon,
			max_lon,
		}
		.checked()
	}

	/// Builds a `Bounds` from four corner points in any order, clamping to
	/// the valid WGS84 domain. Used when reprojected corners may land
	/// marginally outside the legal range.
	pub fn from_corners(lats: &[f64], lons: &[f64]) -> Result<Bounds> {
		ensure!(!lats.is_empty() && !lons.is_empty(), "corner lists must be non-empty");
		let fold = |values: &[f64]| {
			values
				.iter()
				.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
		};
		let (min_lat, max_lat) = fold(lats);
		let (min_lon, max_lon) = fold(lons);
		Bounds {
			min_lat: min_lat.clamp(-90.0, 90.0),
			max_lat: max_lat.clamp(-90.0, 90.0),
			min_lon: min_lon.clamp(-180.0, 180.0),
			max_lon: max_lon.clamp(-180.0, 180.0),
		}
		.checked()
	}

	/// Returns `true` if the point lies inside the box, inclusive on all
	/// four edges.
	#[must_use]
	pub fn contains(&self, lat: f64, lon: f64) -> bool {
		self.min_lat <= lat && lat <= self.max_lat && self.min_lon <= lon && lon <= self.max_lon
	}

	/// Returns `true` if the two boxes share at least one point.
	#[must_use]
	pub fn intersects(&self, other: &Bounds) -> bool {
		!(self.max_lon < other.min_lon
			|| self.min_lon > other.max_lon
			|| self.max_lat < other.min_lat
			|| self.min_lat > other.max_lat)
	}

	/// Expands this box in place so that it covers `other` as well.
	pub fn extend(&mut self, other: &Bounds) {
		self.min_lat = self.min_lat.min(other.min_lat);
		self.max_lat = self.max_lat.max(other.max_lat);
		self.min_lon = self.min_lon.min(other.min_lon);
		self.max_lon = self.max_lon.max(other.max_lon);
	}

	/// Non-mutating version of [`extend`](Self::extend).
	#[must_use]
	pub fn extended(mut self, other: &Bounds) -> Bounds {
		self.extend(other);
		self
	}

	/// Component-wise union of a non-empty iterator of boxes.
	pub fn union<'a>(mut boxes: impl Iterator<Item = &'a Bounds>) -> Result<Bounds> {
		let mut result = *boxes.next().ok_or_else(|| anyhow::anyhow!("union of zero bounds"))?;
		for b in boxes {
			result.extend(b);
		}
		Ok(result)
	}

	/// Latitude extent in degrees.
	#[must_use]
	pub fn lat_range(&self) -> f64 {
		self.max_lat - self.min_lat
	}

	/// Longitude extent in degrees.
	#[must_use]
	pub fn lon_range(&self) -> f64 {
		self.max_lon - self.min_lon
	}

	/// Area in squared degrees. Drives precision classification.
	#[must_use]
	pub fn area_deg2(&self) -> f64 {
		self.lat_range() * self.lon_range()
	}

	/// Center point as `(lat, lon)`.
	#[must_use]
	pub fn center(&self) -> (f64, f64) {
		(
			(self.min_lat + self.max_lat) / 2.0,
			(self.min_lon + self.max_lon) / 2.0,
		)
	}

	fn checked(self) -> Result<Self> {
		ensure!(self.min_lat >= -90.0, "min_lat ({}) must be >= -90", self.min_lat);
		ensure!(self.max_lat <= 90.0, "max_lat ({}) must be <= 90", self.max_lat);
		ensure!(self.min_lon >= -180.0, "min_lon ({}) must be >= -180", self.min_lon);
		ensure!(self.max_lon <= 180.0, "max_lon ({}) must be <= 180", self.max_lon);
		ensure!(
			self.min_lat <= self.max_lat,
			"min_lat ({}) must be <= max_lat ({})",
			self.min_lat,
			self.max_lat
		);
		ensure!(
			self.min_lon <= self.max_lon,
			"min_lon ({}) must be <= max_lon ({})",
			self.min_lon,
			self.max_lon
		);
		Ok(self)
	}

	/// Re-validates a deserialized box. Serde derives bypass `new`, so
	/// loaders call this before trusting persisted values.
	pub fn validate(&self) -> Result<()> {
		self.checked().map(|_| ())
	}
}

impl Debug for Bounds {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"Bounds(lat {}..{}, lon {}..{})",
			self.min_lat, self.max_lat, self.min_lon, self.max_lon
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[test]
	fn creation_and_accessors() {
		let b = Bounds::new(-28.0, -27.0, 152.0, 153.5).unwrap();
		assert_eq!(b.lat_range(), 1.0);
		assert_eq!(b.lon_range(), 1.5);
		assert_eq!(b.area_deg2(), 1.5);
		assert_eq!(b.center(), (-27.5, 152.75));
	}

	#[rstest]
	#[case(-95.0, -27.0, 152.0, 153.0)] // min_lat out of range
	#[case(-28.0, 95.0, 152.0, 153.0)] // max_lat out of range
	#[case(-28.0, -27.0, -190.0, 153.0)] // min_lon out of range
	#[case(-28.0, -27.0, 152.0, 190.0)] // max_lon out of range
	#[case(-27.0, -28.0, 152.0, 153.0)] // lat inverted
	#[case(-28.0, -27.0, 153.0, 152.0)] // lon inverted
	fn rejects_invalid(#[case] min_lat: f64, #[case] max_lat: f64, #[case] min_lon: f64, #[case] max_lon: f64) {
		assert!(Bounds::new(min_lat, max_lat, min_lon, max_lon).is_err());
	}

	#[test]
	fn contains_is_edge_inclusive() {
		let b = Bounds::new(-28.0, -27.0, 152.0, 153.0).unwrap();
		assert!(b.contains(-27.5, 152.5));
		assert!(b.contains(-28.0, 152.0));
		assert!(b.contains(-27.0, 153.0));
		assert!(b.contains(-28.0, 153.0));
		assert!(!b.contains(-28.000001, 152.5));
		assert!(!b.contains(-27.5, 153.000001));
	}

	#[test]
	fn extend_covers_both() {
		let mut a = Bounds::new(-28.0, -27.0, 152.0, 153.0).unwrap();
		let b = Bounds::new(-29.0, -27.5, 152.5, 154.0).unwrap();
		a.extend(&b);
		assert_eq!(a, Bounds::new(-29.0, -27.0, 152.0, 154.0).unwrap());
	}

	#[test]
	fn union_of_many() {
		let boxes = vec![
			Bounds::new(-28.0, -27.0, 152.0, 153.0).unwrap(),
			Bounds::new(-30.0, -29.0, 150.0, 151.0).unwrap(),
			Bounds::new(-27.5, -26.0, 153.0, 154.0).unwrap(),
		];
		let u = Bounds::union(boxes.iter()).unwrap();
		assert_eq!(u, Bounds::new(-30.0, -26.0, 150.0, 154.0).unwrap());
	}

	#[test]
	fn union_of_none_is_an_error() {
		assert!(Bounds::union([].iter()).is_err());
	}

	#[test]
	fn intersects_cases() {
		let a = Bounds::new(-28.0, -27.0, 152.0, 153.0).unwrap();
		let touching = Bounds::new(-27.0, -26.0, 153.0, 154.0).unwrap();
		let disjoint = Bounds::new(-25.0, -24.0, 152.0, 153.0).unwrap();
		assert!(a.intersects(&touching)); // shared corner counts
		assert!(!a.intersects(&disjoint));
	}

	#[test]
	fn serde_round_trip() {
		let b = Bounds::new(-41.4, -41.1, 174.6, 174.9).unwrap();
		let json = serde_json::to_string(&b).unwrap();
		assert!(json.contains("\"min_lat\":-41.4"));
		let back: Bounds = serde_json::from_str(&json).unwrap();
		assert_eq!(b, back);
	}

	#[test]
	fn validate_catches_deserialized_garbage() {
		// A UTM easting smuggled into a longitude field must not pass.
		let bad: Bounds = serde_json::from_str(
			r#"{"min_lat":-28.0,"max_lat":-27.0,"min_lon":492000.0,"max_lon":493000.0}"#,
		)
		.unwrap();
		assert!(bad.validate().is_err());
	}
}
