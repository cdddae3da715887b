use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// How a tile's WGS84 bounds were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtractMethod {
	/// Read from the raster's geotransform, reprojected if needed.
	#[serde(rename = "raster-header")]
	RasterHeader,
	/// Decoded from a recognized filename grid pattern (1 km UTM cell).
	#[serde(rename = "filename-grid")]
	FilenameGrid,
	/// Coarse state/region box derived from path substrings.
	#[serde(rename = "regional-fallback")]
	RegionalFallback,
}

impl Display for ExtractMethod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			ExtractMethod::RasterHeader => "raster-header",
			ExtractMethod::FilenameGrid => "filename-grid",
			ExtractMethod::RegionalFallback => "regional-fallback",
		})
	}
}
