use crate::model::Campaign;
use anyhow::Result;
use demserve_core::Bounds;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Country-level grouping of campaigns. AU campaigns are keyed by UTM
/// zone + survey name, NZ campaigns by survey + product.
///
/// Campaigns live in a `BTreeMap` so serialization order is stable and
/// rebuilds of identical content are byte-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
	/// ISO country code, e.g. "AU" or "NZ".
	pub country: String,
	/// Dominant coordinate system family of the source data.
	pub coordinate_system: String,
	pub campaigns: BTreeMap<String, Campaign>,
}

impl Collection {
	#[must_use]
	pub fn new(country: &str, coordinate_system: &str) -> Collection {
		Collection {
			country: country.to_string(),
			coordinate_system: coordinate_system.to_string(),
			campaigns: BTreeMap::new(),
		}
	}

	/// Union of all campaign bounds, or `None` while empty.
	#[must_use]
	pub fn bounds(&self) -> Option<Bounds> {
		Bounds::union(self.campaigns.values().map(|c| &c.bounds)).ok()
	}

	/// Total number of tiles across campaigns.
	#[must_use]
	pub fn tile_count(&self) -> u64 {
		self.campaigns.values().map(|c| c.file_count).sum()
	}

	/// Recomputes every campaign's derived fields.
	pub fn recompute(&mut self) -> Result<()> {
		for campaign in self.campaigns.values_mut() {
			campaign.recompute()?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_collection_has_no_bounds() {
		let c = Collection::new("AU", "GDA94 / MGA");
		assert!(c.bounds().is_none());
		assert_eq!(c.tile_count(), 0);
	}
}
