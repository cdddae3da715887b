//! Read-only campaign queries for the coverage API and map UI.

mod geojson;

pub use geojson::campaign_footprint;

use crate::index::{Cluster, IndexedCorpus};
use crate::model::{Campaign, TileEntry};
use demserve_core::{Bounds, DataType};
use serde::Serialize;

/// Filter set for campaign listings. All criteria are optional and
/// conjunctive.
#[derive(Debug, Default, Clone)]
pub struct CampaignFilters {
	pub bbox: Option<Bounds>,
	pub min_resolution_m: Option<f64>,
	pub max_resolution_m: Option<f64>,
	pub data_types: Option<Vec<DataType>>,
	pub providers: Option<Vec<String>>,
	/// Country codes of the owning collection ("AU", "NZ").
	pub regions: Option<Vec<String>>,
	pub year_from: Option<u16>,
	pub year_to: Option<u16>,
}

impl CampaignFilters {
	fn matches(&self, country: &str, campaign: &Campaign) -> bool {
		if let Some(bbox) = &self.bbox {
			if !campaign.bounds.intersects(bbox) {
				return false;
			}
		}
		if let Some(min) = self.min_resolution_m {
			if campaign.resolution_m < min {
				return false;
			}
		}
		if let Some(max) = self.max_resolution_m {
			if campaign.resolution_m > max {
				return false;
			}
		}
		if let Some(types) = &self.data_types {
			if !types.contains(&campaign.data_type) {
				return false;
			}
		}
		if let Some(providers) = &self.providers {
			if !providers.iter().any(|p| p.eq_ignore_ascii_case(&campaign.provider)) {
				return false;
			}
		}
		if let Some(regions) = &self.regions {
			if !regions.iter().any(|r| r.eq_ignore_ascii_case(country)) {
				return false;
			}
		}
		if self.year_from.is_some() || self.year_to.is_some() {
			// Campaigns without a mined year never match a date filter.
			let Some(year) = campaign.campaign_year else {
				return false;
			};
			if self.year_from.is_some_and(|f| year < f) || self.year_to.is_some_and(|t| year > t) {
				return false;
			}
		}
		true
	}
}

/// One campaign as returned by the query API.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignView {
	pub id: String,
	pub name: String,
	pub provider: String,
	pub data_type: DataType,
	pub resolution_m: f64,
	pub priority: u32,
	pub cost_per_query: f64,
	pub bounds: Bounds,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub campaign_year: Option<u16>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub survey_name: Option<String>,
	pub country: String,
	pub file_count: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub files: Option<Vec<TileEntry>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub geometry: Option<serde_json::Value>,
}

impl CampaignView {
	fn build(id: &str, country: &str, campaign: &Campaign, include_tiles: bool, include_geometry: bool) -> CampaignView {
		CampaignView {
			id: id.to_string(),
			name: campaign.name.clone(),
			provider: campaign.provider.clone(),
			data_type: campaign.data_type.clone(),
			resolution_m: campaign.resolution_m,
			priority: campaign.priority,
			cost_per_query: campaign.cost_per_query,
			bounds: campaign.bounds,
			campaign_year: campaign.campaign_year,
			survey_name: campaign.survey_name.clone(),
			country: country.to_string(),
			file_count: campaign.file_count,
			files: include_tiles.then(|| campaign.files.clone()),
			geometry: include_geometry.then(|| campaign_footprint(campaign)),
		}
	}
}

/// One page of a campaign listing.
#[derive(Debug, Serialize)]
pub struct CampaignPage {
	pub campaigns: Vec<CampaignView>,
	pub total_count: usize,
	pub page: usize,
	pub page_size: usize,
	pub has_next: bool,
}

/// Filtered, paginated campaign listing, ordered by campaign id.
#[must_use]
pub fn list(
	corpus: &IndexedCorpus,
	filters: &CampaignFilters,
	page: usize,
	page_size: usize,
	include_tiles: bool,
	include_geometry: bool,
) -> CampaignPage {
	let page = page.max(1);
	let page_size = page_size.clamp(1, 500);

	let mut matching: Vec<(&str, &str, &Campaign)> = corpus
		.index()
		.collections
		.iter()
		.flat_map(|collection| {
			collection
				.campaigns
				.iter()
				.map(move |(id, campaign)| (id.as_str(), collection.country.as_str(), campaign))
		})
		.filter(|(_, country, campaign)| filters.matches(country, campaign))
		.collect();
	matching.sort_by(|a, b| a.0.cmp(b.0));

	let total_count = matching.len();
	let start = (page - 1) * page_size;
	let views: Vec<CampaignView> = matching
		.into_iter()
		.skip(start)
		.take(page_size)
		.map(|(id, country, campaign)| CampaignView::build(id, country, campaign, include_tiles, include_geometry))
		.collect();

	CampaignPage {
		has_next: start + views.len() < total_count,
		total_count,
		page,
		page_size,
		campaigns: views,
	}
}

/// Single campaign lookup by id.
#[must_use]
pub fn get(corpus: &IndexedCorpus, id: &str, include_tiles: bool, include_geometry: bool) -> Option<CampaignView> {
	let (collection, campaign) = corpus.index().campaign(id)?;
	Some(CampaignView::build(
		id,
		&collection.country,
		campaign,
		include_tiles,
		include_geometry,
	))
}

/// Campaigns intersecting a viewport, via the coarse grid index.
#[must_use]
pub fn in_bounds(corpus: &IndexedCorpus, viewport: &Bounds) -> Vec<CampaignView> {
	corpus
		.campaigns_intersecting(viewport)
		.into_iter()
		.map(|(id, campaign)| {
			let country = corpus
				.index()
				.campaign(id)
				.map(|(c, _)| c.country.clone())
				.unwrap_or_default();
			CampaignView::build(id, &country, campaign, false, false)
		})
		.collect()
}

/// Zoom-dependent clustering for the map UI.
#[must_use]
pub fn clusters(corpus: &IndexedCorpus, viewport: &Bounds, zoom: u8) -> Vec<Cluster> {
	corpus.clusters(viewport, zoom)
}
