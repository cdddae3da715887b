use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

/// Named selection policy controlling how candidate datasets are scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionPolicy {
	/// Prioritize resolution and tight local coverage.
	#[default]
	Fastest,
	/// Prioritize lowest cost per query.
	Cheapest,
	/// Balance cost against performance.
	Balanced,
	/// Prioritize accuracy regardless of cost.
	Quality,
}

impl SelectionPolicy {
	pub const ALL: [SelectionPolicy; 4] = [
		SelectionPolicy::Fastest,
		SelectionPolicy::Cheapest,
		SelectionPolicy::Balanced,
		SelectionPolicy::Quality,
	];
}

impl FromStr for SelectionPolicy {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(match s.to_ascii_lowercase().as_str() {
			"fastest" => SelectionPolicy::Fastest,
			"cheapest" => SelectionPolicy::Cheapest,
			"balanced" => SelectionPolicy::Balanced,
			"quality" => SelectionPolicy::Quality,
			_ => bail!("unknown selection policy '{s}' (expected fastest, cheapest, balanced or quality)"),
		})
	}
}

impl Display for SelectionPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			SelectionPolicy::Fastest => "fastest",
			SelectionPolicy::Cheapest => "cheapest",
			SelectionPolicy::Balanced => "balanced",
			SelectionPolicy::Quality => "quality",
		})
	}
}
