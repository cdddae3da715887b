use thiserror::Error;

/// Failure modes of tile metadata extraction.
///
/// `HeaderUnreadable` and `ReprojectionUnavailable` are retryable: the
/// extractor falls through to the next strategy. `OutsideExpectedRegion`
/// marks output that parsed but cannot belong to the corpus.
#[derive(Debug, Error)]
pub enum ExtractError {
	#[error("raster header unreadable: {0}")]
	HeaderUnreadable(String),

	#[error("filename matches no recognized grid pattern: {0}")]
	UnrecognizedPattern(String),

	#[error("no coordinate transform available for CRS '{0}'")]
	ReprojectionUnavailable(String),

	#[error("bounds fall outside the expected AU/NZ region: {0}")]
	OutsideExpectedRegion(String),
}
