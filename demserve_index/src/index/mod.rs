//! Query side of the spatial index.
//!
//! [`IndexedCorpus`] wraps a loaded [`SpatialIndex`] with the derived
//! lookup structures the document itself does not carry: per-collection
//! bounds for the top-level test and a one-degree grid over campaign
//! bboxes for viewport queries. The wrapped index is immutable; the
//! builder constructs a fresh corpus after every (re)build.

mod grid;
mod validate;

pub use grid::GridIndex;
pub use validate::{ValidationReport, validate};

use crate::model::{Campaign, Collection, SpatialIndex, TileEntry};
use demserve_core::Bounds;

/// One tile whose bounds contain a queried point, with its context.
#[derive(Debug, Clone, Copy)]
pub struct TileHit<'a> {
	pub collection: &'a Collection,
	pub campaign_id: &'a str,
	pub campaign: &'a Campaign,
	pub tile: &'a TileEntry,
}

/// A bucket of campaigns for map clustering.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Cluster {
	pub id: String,
	pub center_lat: f64,
	pub center_lon: f64,
	pub campaign_count: usize,
	pub bounds: Bounds,
}

/// An immutable spatial index plus its derived query structures.
pub struct IndexedCorpus {
	index: SpatialIndex,
	collection_bounds: Vec<Option<Bounds>>,
	grid: GridIndex,
}

impl IndexedCorpus {
	#[must_use]
	pub fn new(index: SpatialIndex) -> IndexedCorpus {
		let collection_bounds = index.collections.iter().map(Collection::bounds).collect();
		let grid = GridIndex::build(&index);
		IndexedCorpus {
			index,
			collection_bounds,
			grid,
		}
	}

	#[must_use]
	pub fn index(&self) -> &SpatialIndex {
		&self.index
	}

	/// All tiles containing the point, hierarchically narrowed:
	/// collection bbox, then campaign bbox, then a scan restricted to the
	/// tiles of matching campaigns. The second return value is the number
	/// of tile records examined, which stays proportional to the matching
	/// campaigns' sizes rather than the corpus.
	#[must_use]
	pub fn find_tiles(&self, lat: f64, lon: f64) -> (Vec<TileHit<'_>>, usize) {
		let mut hits = Vec::new();
		let mut scanned = 0usize;
		for (collection, bounds) in self.index.collections.iter().zip(&self.collection_bounds) {
			match bounds {
				Some(b) if b.contains(lat, lon) => {}
				_ => continue,
			}
			for (campaign_id, campaign) in &collection.campaigns {
				if !campaign.bounds.contains(lat, lon) {
					continue;
				}
				scanned += campaign.files.len();
				for tile in campaign.tiles_at(lat, lon) {
					hits.push(TileHit {
						collection,
						campaign_id,
						campaign,
						tile,
					});
				}
			}
		}
		(hits, scanned)
	}

	/// Campaigns whose bounds intersect the viewport, found through the
	/// one-degree grid. Results are sorted by campaign id.
	#[must_use]
	pub fn campaigns_intersecting(&self, viewport: &Bounds) -> Vec<(&str, &Campaign)> {
		let mut out: Vec<(&str, &Campaign)> = self
			.grid
			.candidates(viewport)
			.into_iter()
			.filter_map(|(collection_idx, campaign_id)| {
				let campaign = self.index.collections[collection_idx].campaigns.get(campaign_id)?;
				campaign.bounds.intersects(viewport).then_some((campaign_id.as_str(), campaign))
			})
			.collect();
		out.sort_by(|a, b| a.0.cmp(b.0));
		out.dedup_by(|a, b| a.0 == b.0);
		out
	}

	/// Buckets campaign centroids for the map UI. Cell size widens as the
	/// zoom level drops; at zoom >= 11 every campaign is its own cluster.
	#[must_use]
	pub fn clusters(&self, viewport: &Bounds, zoom: u8) -> Vec<Cluster> {
		let campaigns = self.campaigns_intersecting(viewport);
		if zoom >= 11 {
			return campaigns
				.into_iter()
				.map(|(id, campaign)| {
					let (center_lat, center_lon) = campaign.bounds.center();
					Cluster {
						id: id.to_string(),
						center_lat,
						center_lon,
						campaign_count: 1,
						bounds: campaign.bounds,
					}
				})
				.collect();
		}

		let cell = match zoom {
			0..=6 => 5.0,
			7..=8 => 2.0,
			_ => 1.0,
		};

		let mut buckets: std::collections::BTreeMap<(i32, i32), (Bounds, usize)> = std::collections::BTreeMap::new();
		for (_, campaign) in campaigns {
			let (lat, lon) = campaign.bounds.center();
			let key = ((lon / cell).floor() as i32, (lat / cell).floor() as i32);
			buckets
				.entry(key)
				.and_modify(|(bounds, count)| {
					bounds.extend(&campaign.bounds);
					*count += 1;
				})
				.or_insert((campaign.bounds, 1));
		}

		buckets
			.into_iter()
			.map(|((gx, gy), (bounds, count))| {
				let (center_lat, center_lon) = bounds.center();
				Cluster {
					id: format!("cluster_{zoom}_{gx}_{gy}"),
					center_lat,
					center_lon,
					campaign_count: count,
					bounds,
				}
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{brisbane_sw_tile_bounds, small_index};
	use pretty_assertions::assert_eq;

	#[test]
	fn find_tiles_scans_only_matching_campaigns() {
		let corpus = IndexedCorpus::new(small_index());
		// Point interior to exactly one brisbane tile.
		let (hits, scanned) = corpus.find_tiles(-27.47, 153.03);
		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0].campaign_id, "brisbane2019_z56");
		// The sydney campaign has 100 tiles; none of them may be scanned.
		let brisbane_size = corpus.index().campaign("brisbane2019_z56").unwrap().1.files.len();
		assert_eq!(scanned, brisbane_size);
	}

	#[test]
	fn find_tiles_outside_everything_is_empty() {
		let corpus = IndexedCorpus::new(small_index());
		let (hits, scanned) = corpus.find_tiles(-26.0, 134.0);
		assert!(hits.is_empty());
		assert_eq!(scanned, 0);
	}

	#[test]
	fn point_on_tile_edge_hits() {
		let corpus = IndexedCorpus::new(small_index());
		let tile = brisbane_sw_tile_bounds();
		let (hits, _) = corpus.find_tiles(tile.min_lat, tile.min_lon);
		assert!(!hits.is_empty());
	}

	#[test]
	fn campaigns_intersecting_viewport() {
		let corpus = IndexedCorpus::new(small_index());
		let viewport = Bounds::new(-28.0, -27.0, 152.5, 153.5).unwrap();
		let ids: Vec<&str> = corpus.campaigns_intersecting(&viewport).iter().map(|(id, _)| *id).collect();
		assert_eq!(ids, vec!["brisbane2019_z56", "goldcoast2020_z56"]);
	}

	#[test]
	fn clusters_merge_at_low_zoom_and_split_at_high_zoom() {
		let corpus = IndexedCorpus::new(small_index());
		let everywhere = Bounds::new(-48.0, -9.0, 110.0, 180.0).unwrap();

		let low = corpus.clusters(&everywhere, 4);
		assert!(low.len() < corpus.index().campaigns().count());
		assert!(low.iter().all(|c| c.id.starts_with("cluster_4_")));

		let high = corpus.clusters(&everywhere, 12);
		assert_eq!(high.len(), corpus.index().campaigns().count());
		assert!(high.iter().all(|c| c.campaign_count == 1));
	}
}
