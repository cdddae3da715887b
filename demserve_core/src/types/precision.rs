use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Size bucket of a tile's bounds, derived from its area in squared
/// degrees. Boundary areas go to the better class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecisionClass {
	/// area <= 0.001 deg² (roughly a 1 km tile)
	Precise,
	/// area <= 1 deg²
	Reasonable,
	/// anything larger, typically a state-level fallback box
	Regional,
}

impl PrecisionClass {
	#[must_use]
	pub fn from_area_deg2(area: f64) -> PrecisionClass {
		if area <= 0.001 {
			PrecisionClass::Precise
		} else if area <= 1.0 {
			PrecisionClass::Reasonable
		} else {
			PrecisionClass::Regional
		}
	}
}

impl Display for PrecisionClass {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			PrecisionClass::Precise => "precise",
			PrecisionClass::Reasonable => "reasonable",
			PrecisionClass::Regional => "regional",
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(0.0001, PrecisionClass::Precise)]
	#[case(0.001, PrecisionClass::Precise)] // boundary goes to the better class
	#[case(0.0011, PrecisionClass::Reasonable)]
	#[case(1.0, PrecisionClass::Reasonable)] // boundary goes to the better class
	#[case(1.0001, PrecisionClass::Regional)]
	#[case(40.0, PrecisionClass::Regional)]
	fn classification(#[case] area: f64, #[case] expected: PrecisionClass) {
		assert_eq!(PrecisionClass::from_area_deg2(area), expected);
	}

	#[test]
	fn serde_labels() {
		assert_eq!(serde_json::to_string(&PrecisionClass::Precise).unwrap(), "\"precise\"");
	}
}
