use crate::model::TileEntry;
use anyhow::{Result, ensure};
use demserve_core::{Bounds, DataType};
use serde::{Deserialize, Serialize};

/// A survey campaign: a named set of tiles captured together, the middle
/// level of the index hierarchy.
///
/// `bounds` is always the union of the member tile bounds and
/// `file_count` always equals `files.len()`; both are recomputed by
/// [`recompute`](Self::recompute) whenever membership changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
	pub name: String,
	pub provider: String,
	pub data_type: DataType,
	pub resolution_m: f64,
	/// Lower value wins ties during selection.
	pub priority: u32,
	pub cost_per_query: f64,
	pub bounds: Bounds,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub campaign_year: Option<u16>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub survey_name: Option<String>,
	pub file_count: u64,
	pub files: Vec<TileEntry>,
}

impl Campaign {
	/// Restores the derived fields after membership changed: files are
	/// stably sorted by key, duplicates by key are rejected, bounds and
	/// count are recomputed.
	pub fn recompute(&mut self) -> Result<()> {
		ensure!(!self.files.is_empty(), "campaign '{}' has no tiles", self.name);
		self.files.sort_by(|a, b| a.key.cmp(&b.key));
		for pair in self.files.windows(2) {
			ensure!(
				pair[0].key != pair[1].key,
				"campaign '{}' has duplicate tile key '{}'",
				self.name,
				pair[0].key
			);
		}
		self.bounds = Bounds::union(self.files.iter().map(|f| &f.bounds))?;
		self.file_count = self.files.len() as u64;
		Ok(())
	}

	/// Tiles whose bounds contain the point, in key order.
	pub fn tiles_at(&self, lat: f64, lon: f64) -> impl Iterator<Item = &TileEntry> {
		self.files.iter().filter(move |t| t.bounds.contains(lat, lon))
	}

	/// Replaces or inserts a tile by key, keeping derived fields correct.
	pub fn upsert_tile(&mut self, tile: TileEntry) -> Result<()> {
		self.files.retain(|t| t.key != tile.key);
		self.files.push(tile);
		self.recompute()
	}
}
