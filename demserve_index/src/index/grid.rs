use crate::model::SpatialIndex;
use demserve_core::Bounds;
use std::collections::HashMap;

/// Cell size of the coarse campaign grid, in degrees.
const CELL_DEG: f64 = 1.0;

/// One-degree grid over campaign bounding boxes. Viewport queries
/// collect candidates from the covered cells instead of scanning every
/// campaign.
pub struct GridIndex {
	cells: HashMap<(i32, i32), Vec<(usize, String)>>,
}

impl GridIndex {
	#[must_use]
	pub fn build(index: &SpatialIndex) -> GridIndex {
		let mut cells: HashMap<(i32, i32), Vec<(usize, String)>> = HashMap::new();
		for (collection_idx, campaign_id, campaign) in index.campaigns() {
			for cell in cells_covering(&campaign.bounds) {
				cells.entry(cell).or_default().push((collection_idx, campaign_id.to_string()));
			}
		}
		GridIndex { cells }
	}

	/// Campaigns registered in any cell the viewport touches. May contain
	/// duplicates and false positives; callers re-check exact bounds.
	#[must_use]
	pub fn candidates(&self, viewport: &Bounds) -> Vec<(usize, &String)> {
		let mut out = Vec::new();
		for cell in cells_covering(viewport) {
			if let Some(entries) = self.cells.get(&cell) {
				out.extend(entries.iter().map(|(idx, id)| (*idx, id)));
			}
		}
		out
	}

	#[must_use]
	pub fn cell_count(&self) -> usize {
		self.cells.len()
	}
}

fn cells_covering(bounds: &Bounds) -> impl Iterator<Item = (i32, i32)> {
	let min_x = (bounds.min_lon / CELL_DEG).floor() as i32;
	let max_x = (bounds.max_lon / CELL_DEG).floor() as i32;
	let min_y = (bounds.min_lat / CELL_DEG).floor() as i32;
	let max_y = (bounds.max_lat / CELL_DEG).floor() as i32;
	(min_y..=max_y).flat_map(move |y| (min_x..=max_x).map(move |x| (x, y)))
}
