use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display};
use std::str::FromStr;

/// Kind of elevation product a campaign delivers.
///
/// The catalog strings are preserved verbatim for unknown kinds so a
/// round-trip through the index never loses the provider's label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
	Dem,
	Dsm,
	Lidar,
	Photogrammetry,
	Other(String),
}

impl DataType {
	/// Infallible parse: unknown labels become [`DataType::Other`].
	#[must_use]
	pub fn parse_str(s: &str) -> DataType {
		match s.to_ascii_lowercase().as_str() {
			"dem" | "dem_1m" => DataType::Dem,
			"dsm" | "dsm_1m" => DataType::Dsm,
			"lidar" => DataType::Lidar,
			"photogrammetry" => DataType::Photogrammetry,
			_ => DataType::Other(s.to_string()),
		}
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		match self {
			DataType::Dem => "DEM",
			DataType::Dsm => "DSM",
			DataType::Lidar => "LiDAR",
			DataType::Photogrammetry => "Photogrammetry",
			DataType::Other(s) => s,
		}
	}
}

impl FromStr for DataType {
	type Err = std::convert::Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(DataType::parse_str(s))
	}
}

impl Display for DataType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl Serialize for DataType {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(self.as_str())
	}
}

impl<'de> Deserialize<'de> for DataType {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		Ok(DataType::parse_str(&s))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_known_and_unknown() {
		assert_eq!("LiDAR".parse::<DataType>().unwrap(), DataType::Lidar);
		assert_eq!("dem_1m".parse::<DataType>().unwrap(), DataType::Dem);
		assert_eq!("dsm_1m".parse::<DataType>().unwrap(), DataType::Dsm);
		assert_eq!(
			"Bathymetry".parse::<DataType>().unwrap(),
			DataType::Other("Bathymetry".to_string())
		);
	}

	#[test]
	fn serde_uses_canonical_labels() {
		assert_eq!(serde_json::to_string(&DataType::Lidar).unwrap(), "\"LiDAR\"");
		let back: DataType = serde_json::from_str("\"DEM\"").unwrap();
		assert_eq!(back, DataType::Dem);
	}
}
