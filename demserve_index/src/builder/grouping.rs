//! Campaign grouping keys.
//!
//! The two national corpora lay out their buckets differently:
//!
//! - **AU**: tiles are organized by UTM zone directories (`/z55/`),
//!   refined by a campaign name mined from the remaining path segments.
//!   Structural segments are skipped; a year-bearing segment is the
//!   preferred name.
//! - **NZ**: the survey name is the second path segment and the product
//!   kind (`dem_1m` / `dsm_1m`) the third.

use crate::model::TileEntry;
use demserve_core::{Crs, DataType};
use lazy_static::lazy_static;
use regex::Regex;

/// Which grouping scheme a build run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountryScheme {
	Au,
	Nz,
}

impl CountryScheme {
	#[must_use]
	pub fn country_code(&self) -> &'static str {
		match self {
			CountryScheme::Au => "AU",
			CountryScheme::Nz => "NZ",
		}
	}

	#[must_use]
	pub fn coordinate_system(&self) -> &'static str {
		match self {
			CountryScheme::Au => "GDA94 / MGA",
			CountryScheme::Nz => "NZGD2000 / NZTM",
		}
	}
}

/// Where a tile belongs in the hierarchy, plus the campaign metadata
/// that is derived from the path alone.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignKey {
	pub campaign_id: String,
	pub name: String,
	pub provider: String,
	pub data_type: DataType,
	pub survey_name: Option<String>,
	pub campaign_year: Option<u16>,
}

lazy_static! {
	static ref RE_ZONE_SEGMENT: Regex = Regex::new(r"^z(?:one)?(\d{1,2})$").unwrap();
	static ref RE_YEAR: Regex = Regex::new(r"(19|20)\d{2}").unwrap();
}

const AU_STRUCTURAL: &[&str] = &[
	"au", "elvis", "dem", "dems", "dsm", "lidar", "tiles", "geotiff", "raw", "data", "1m", "2m", "5m",
];

/// Derives the campaign key for one extracted tile.
#[must_use]
pub fn campaign_key(scheme: CountryScheme, tile: &TileEntry) -> CampaignKey {
	match scheme {
		CountryScheme::Au => au_campaign_key(tile),
		CountryScheme::Nz => nz_campaign_key(tile),
	}
}

fn au_campaign_key(tile: &TileEntry) -> CampaignKey {
	let directories: Vec<&str> = {
		let mut segments: Vec<&str> = tile.key.split('/').filter(|s| !s.is_empty()).collect();
		segments.pop(); // drop the filename
		segments
	};

	let zone = directories
		.iter()
		.find_map(|s| RE_ZONE_SEGMENT.captures(&s.to_ascii_lowercase()).and_then(|c| c[1].parse::<u8>().ok()))
		.or(match &tile.native_crs {
			Crs::UtmSouth { zone } => Some(*zone),
			_ => None,
		});

	let candidates: Vec<String> = directories
		.iter()
		.map(|s| s.to_ascii_lowercase())
		.filter(|s| !AU_STRUCTURAL.contains(&s.as_str()) && !RE_ZONE_SEGMENT.is_match(s))
		.collect();

	// A year-bearing segment names the campaign; otherwise the deepest
	// non-structural directory does.
	let name = candidates
		.iter()
		.find(|s| RE_YEAR.is_match(s))
		.or_else(|| candidates.last())
		.cloned()
		.unwrap_or_else(|| "unknown".to_string());

	let id_name = identifier(&name);
	let campaign_id = match zone {
		Some(zone) => format!("{id_name}_z{zone}"),
		None => id_name.clone(),
	};

	CampaignKey {
		campaign_id,
		campaign_year: mine_year(&name),
		name,
		provider: "Elvis".to_string(),
		data_type: DataType::Lidar,
		survey_name: None,
	}
}

fn nz_campaign_key(tile: &TileEntry) -> CampaignKey {
	let segments: Vec<&str> = tile.key.split('/').filter(|s| !s.is_empty()).collect();
	let survey = segments.get(1).copied().unwrap_or("unknown").to_ascii_lowercase();
	let product = segments.get(2).copied().unwrap_or("dem_1m").to_ascii_lowercase();

	CampaignKey {
		campaign_id: format!("{}_{}", identifier(&survey), identifier(&product)),
		campaign_year: mine_year(&survey),
		name: survey.clone(),
		provider: "LINZ".to_string(),
		data_type: DataType::parse_str(&product),
		survey_name: Some(survey),
	}
}

/// Lowercase alphanumeric identifier; everything else collapses to '_'.
fn identifier(s: &str) -> String {
	let mut out = String::with_capacity(s.len());
	let mut last_was_sep = false;
	for c in s.chars() {
		if c.is_ascii_alphanumeric() {
			out.push(c.to_ascii_lowercase());
			last_was_sep = false;
		} else if !last_was_sep && !out.is_empty() {
			out.push('_');
			last_was_sep = true;
		}
	}
	out.trim_end_matches('_').to_string()
}

/// First plausible capture year in a name.
#[must_use]
pub fn mine_year(name: &str) -> Option<u16> {
	RE_YEAR.find(name).and_then(|m| m.as_str().parse().ok())
}
