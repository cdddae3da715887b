//! Structural validation of an index document.
//!
//! Run after every build and at startup. A failed report keeps the old
//! index in place (build) or refuses to serve (startup).

use crate::model::{INDEX_SCHEMA_VERSION, SpatialIndex};
use demserve_core::Bounds;
use std::collections::HashSet;

/// Outcome of a validation pass; empty means structurally sound.
#[derive(Debug, Default)]
pub struct ValidationReport {
	pub problems: Vec<String>,
	pub tiles_checked: u64,
}

impl ValidationReport {
	#[must_use]
	pub fn is_ok(&self) -> bool {
		self.problems.is_empty()
	}

	fn problem(&mut self, message: String) {
		self.problems.push(message);
	}
}

/// Checks every invariant the index document promises: schema version,
/// per-tile consistency, campaign bounds as unions, counts, and key
/// uniqueness.
#[must_use]
pub fn validate(index: &SpatialIndex) -> ValidationReport {
	let mut report = ValidationReport::default();

	if index.schema_version != INDEX_SCHEMA_VERSION {
		report.problem(format!(
			"schema version '{}' does not match supported '{INDEX_SCHEMA_VERSION}'",
			index.schema_version
		));
	}

	let mut total: u64 = 0;
	for collection in &index.collections {
		for (campaign_id, campaign) in &collection.campaigns {
			if campaign.files.is_empty() {
				report.problem(format!("campaign '{campaign_id}' has no tiles"));
				continue;
			}
			if campaign.file_count != campaign.files.len() as u64 {
				report.problem(format!(
					"campaign '{campaign_id}' declares {} files but lists {}",
					campaign.file_count,
					campaign.files.len()
				));
			}

			let mut keys: HashSet<&str> = HashSet::with_capacity(campaign.files.len());
			for tile in &campaign.files {
				report.tiles_checked += 1;
				if !keys.insert(&tile.key) {
					report.problem(format!("campaign '{campaign_id}' has duplicate tile key '{}'", tile.key));
				}
				if let Err(e) = tile.check() {
					report.problem(format!("campaign '{campaign_id}': {e}"));
				}
			}

			match Bounds::union(campaign.files.iter().map(|t| &t.bounds)) {
				Ok(union) if union == campaign.bounds => {}
				Ok(union) => report.problem(format!(
					"campaign '{campaign_id}' bounds {:?} differ from tile union {:?}",
					campaign.bounds, union
				)),
				Err(e) => report.problem(format!("campaign '{campaign_id}': {e}")),
			}

			total += campaign.files.len() as u64;
		}
	}

	if total != index.total_tile_count {
		report.problem(format!(
			"total_tile_count is {} but collections enumerate {total} tiles",
			index.total_tile_count
		));
	}

	report
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::small_index;

	#[test]
	fn fixture_index_is_structurally_sound() {
		let report = validate(&small_index());
		assert!(report.is_ok(), "problems: {:?}", report.problems);
		assert_eq!(report.tiles_checked, small_index().total_tile_count);
	}

	#[test]
	fn detects_wrong_total() {
		let mut index = small_index();
		index.total_tile_count += 1;
		let report = validate(&index);
		assert!(!report.is_ok());
		assert!(report.problems[0].contains("total_tile_count"));
	}

	#[test]
	fn detects_stale_campaign_bounds() {
		let mut index = small_index();
		let campaign = index.collections[0].campaigns.values_mut().next().unwrap();
		campaign.bounds = Bounds::new(-10.0, -9.0, 120.0, 121.0).unwrap();
		assert!(!validate(&index).is_ok());
	}

	#[test]
	fn detects_duplicate_keys() {
		let mut index = small_index();
		let campaign = index.collections[0].campaigns.values_mut().next().unwrap();
		let duplicate = campaign.files[0].clone();
		campaign.files.push(duplicate);
		campaign.file_count += 1;
		index.total_tile_count += 1;
		let report = validate(&index);
		assert!(report.problems.iter().any(|p| p.contains("duplicate tile key")));
	}

	#[test]
	fn detects_schema_drift() {
		let mut index = small_index();
		index.schema_version = "0.9".to_string();
		assert!(!validate(&index).is_ok());
	}
}
