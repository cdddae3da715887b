//! Process settings from environment variables.
//!
//! Object-storage credentials themselves stay in the standard `AWS_*`
//! variables consumed by the storage layer; everything demserve-specific
//! lives under the `DEMSERVE_` prefix. Provider API keys are looked up
//! through the env var named in each provider's catalog metadata, and
//! quotas can be overridden per provider via
//! `DEMSERVE_PROVIDER_<ID>_DAILY_QUOTA` / `..._PER_SECOND`.

use crate::limiter::LimiterMode;
use crate::orchestrator::DEFAULT_PROVIDER_COOLOFF;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
	/// Object-storage bucket holding the AU corpus (`DEMSERVE_BUCKET`).
	pub bucket: Option<String>,
	/// Path of the persisted spatial index (`DEMSERVE_INDEX_PATH`).
	pub index_path: PathBuf,
	/// Path of the source catalog document (`DEMSERVE_SOURCES_PATH`).
	pub sources_path: PathBuf,
	/// Rate-limiter backing store (`DEMSERVE_REDIS_URL`).
	pub redis_url: Option<String>,
	/// Behavior when the backing store is down
	/// (`DEMSERVE_RATE_LIMITER_MODE`: strict | degraded | local).
	pub limiter_mode: LimiterMode,
	/// How long a rate-limited provider is skipped
	/// (`DEMSERVE_PROVIDER_COOLOFF_SECS`).
	pub provider_cooloff: Duration,
	/// Builder worker-pool size (`DEMSERVE_BUILD_WORKERS`).
	pub build_workers: Option<usize>,
	/// Builder checkpoint interval (`DEMSERVE_CHECKPOINT_INTERVAL`).
	pub checkpoint_interval: Option<u64>,
}

impl Settings {
	/// Reads all settings, with defaults suitable for development.
	pub fn from_env() -> Result<Settings> {
		Ok(Settings {
			bucket: optional("DEMSERVE_BUCKET"),
			index_path: optional("DEMSERVE_INDEX_PATH")
				.map(PathBuf::from)
				.unwrap_or_else(|| PathBuf::from("config/spatial_index.json")),
			sources_path: optional("DEMSERVE_SOURCES_PATH")
				.map(PathBuf::from)
				.unwrap_or_else(|| PathBuf::from("config/elevation_sources.json")),
			redis_url: optional("DEMSERVE_REDIS_URL"),
			limiter_mode: match optional("DEMSERVE_RATE_LIMITER_MODE") {
				Some(mode) => mode.parse().context("DEMSERVE_RATE_LIMITER_MODE")?,
				None => LimiterMode::Local,
			},
			provider_cooloff: parse_optional::<u64>("DEMSERVE_PROVIDER_COOLOFF_SECS")?
				.map(Duration::from_secs)
				.unwrap_or(DEFAULT_PROVIDER_COOLOFF),
			build_workers: parse_optional("DEMSERVE_BUILD_WORKERS")?,
			checkpoint_interval: parse_optional("DEMSERVE_CHECKPOINT_INTERVAL")?,
		})
	}

	/// Per-provider quota override from the environment.
	#[must_use]
	pub fn provider_override(provider_id: &str, knob: &str) -> Option<u64> {
		let name = format!(
			"DEMSERVE_PROVIDER_{}_{knob}",
			provider_id.to_ascii_uppercase().replace('-', "_")
		);
		std::env::var(name).ok().and_then(|v| v.parse().ok())
	}
}

fn optional(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_optional<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
	T::Err: std::error::Error + Send + Sync + 'static,
{
	match optional(name) {
		Some(value) => Ok(Some(value.parse().with_context(|| format!("parsing {name}='{value}'"))?)),
		None => Ok(None),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn provider_cooloff_parses_seconds() {
		unsafe { std::env::set_var("DEMSERVE_PROVIDER_COOLOFF_SECS", "15") };
		let settings = Settings::from_env().unwrap();
		assert_eq!(settings.provider_cooloff, Duration::from_secs(15));
		unsafe { std::env::remove_var("DEMSERVE_PROVIDER_COOLOFF_SECS") };

		let settings = Settings::from_env().unwrap();
		assert_eq!(settings.provider_cooloff, DEFAULT_PROVIDER_COOLOFF);
	}

	#[test]
	fn provider_override_name_mangling() {
		// Env access in tests is process-global; use a unique name.
		unsafe { std::env::set_var("DEMSERVE_PROVIDER_GPXZ_API_DAILY_QUOTA", "250") };
		assert_eq!(Settings::provider_override("gpxz-api", "DAILY_QUOTA"), Some(250));
		assert_eq!(Settings::provider_override("gpxz-api", "PER_SECOND"), None);
		unsafe { std::env::remove_var("DEMSERVE_PROVIDER_GPXZ_API_DAILY_QUOTA") };
	}
}
