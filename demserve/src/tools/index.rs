//! The `index` subcommand family: build, update and validate the
//! spatial index.
//!
//! Exit codes: 0 success, 1 structural problems, 2 critical failures
//! (unreadable index, schema mismatch, excessive extraction failures),
//! 3 interrupt.

use demserve::settings::Settings;
use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand as ClapSubcommand, ValueEnum};
use demserve_index::builder::{BuildConfig, BuildError, CountryScheme, IndexBuilder};
use demserve_index::index::validate;
use demserve_index::model::SpatialIndex;
use demserve_index::TileStore;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct Subcommand {
	#[command(subcommand)]
	command: IndexCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Country {
	Au,
	Nz,
}

impl From<Country> for CountryScheme {
	fn from(country: Country) -> CountryScheme {
		match country {
			Country::Au => CountryScheme::Au,
			Country::Nz => CountryScheme::Nz,
		}
	}
}

#[derive(Args, Debug)]
struct BuildArgs {
	/// Which corpus layout to group campaigns by.
	#[arg(long, value_enum)]
	country: Country,

	/// S3 bucket to enumerate (falls back to DEMSERVE_BUCKET).
	#[arg(long)]
	bucket: Option<String>,

	/// Use a local directory instead of a bucket.
	#[arg(long, conflicts_with = "bucket")]
	local_dir: Option<PathBuf>,

	/// Output index path (falls back to DEMSERVE_INDEX_PATH).
	#[arg(long)]
	out: Option<PathBuf>,

	/// Parallel extraction workers.
	#[arg(long)]
	workers: Option<usize>,

	/// Persist a checkpoint every N extracted tiles.
	#[arg(long)]
	checkpoint_every: Option<u64>,

	/// Validation builds: keep at most N tiles per detected region.
	#[arg(long)]
	sample_per_region: Option<usize>,
}

#[derive(ClapSubcommand, Debug)]
enum IndexCommand {
	/// Build the index from a full bucket enumeration.
	Build(BuildArgs),

	/// Incrementally fold new or changed objects into an existing index.
	Update(BuildArgs),

	/// Check an index document against its structural invariants.
	Validate {
		/// Index path (falls back to DEMSERVE_INDEX_PATH).
		#[arg(long)]
		index: Option<PathBuf>,
	},
}

pub fn run(arguments: &Subcommand) -> Result<u8> {
	let runtime = tokio::runtime::Runtime::new()?;
	let settings = Settings::from_env()?;

	match &arguments.command {
		IndexCommand::Build(args) => runtime.block_on(build(args, &settings, false)),
		IndexCommand::Update(args) => runtime.block_on(build(args, &settings, true)),
		IndexCommand::Validate { index } => {
			let path = index.clone().unwrap_or_else(|| settings.index_path.clone());
			validate_index(&path)
		}
	}
}

async fn build(args: &BuildArgs, settings: &Settings, incremental: bool) -> Result<u8> {
	let store = open_store(args, settings)?;
	let index_path = args.out.clone().unwrap_or_else(|| settings.index_path.clone());

	let mut config = BuildConfig::new(CountryScheme::from(args.country));
	if let Some(workers) = args.workers.or(settings.build_workers) {
		config.workers = workers;
	}
	if let Some(every) = args.checkpoint_every.or(settings.checkpoint_interval) {
		config.checkpoint_every = every;
	}
	config.sample_per_region = args.sample_per_region;

	// Flip a watch flag on ctrl-c so the consumer flushes a final
	// checkpoint instead of dying mid-merge.
	let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			let _ = shutdown_tx.send(true);
		}
	});

	let builder = IndexBuilder::new(store, config);
	let outcome = if incremental {
		let existing = match SpatialIndex::load(&index_path) {
			Ok(index) => index,
			Err(e) => {
				log::error!("cannot load existing index for update: {e}");
				return Ok(2);
			}
		};
		builder.update_incremental(existing, &index_path, Some(shutdown_rx)).await
	} else {
		builder.build_full(&index_path, Some(shutdown_rx)).await
	};

	match outcome {
		Ok(report) => {
			println!(
				"index written to {}: {} tiles extracted ({} regional fallbacks)",
				index_path.display(),
				report.extracted,
				report.regional_fallbacks
			);
			for (method, count) in &report.by_method {
				println!("  {method}: {count}");
			}
			Ok(0)
		}
		Err(BuildError::Validation { problems }) => {
			eprintln!("index rejected: {} structural problems", problems.len());
			for problem in problems.iter().take(20) {
				eprintln!("  - {problem}");
			}
			Ok(1)
		}
		Err(e @ BuildError::TooManyFailures { .. }) => {
			eprintln!("build failed: {e}");
			Ok(2)
		}
		Err(BuildError::Interrupted) => {
			eprintln!("build interrupted; resume by re-running the same command");
			Ok(3)
		}
		Err(BuildError::Other(e)) => Err(e),
	}
}

fn open_store(args: &BuildArgs, settings: &Settings) -> Result<TileStore> {
	if let Some(dir) = &args.local_dir {
		return TileStore::local(dir);
	}
	let bucket = args
		.bucket
		.clone()
		.or_else(|| settings.bucket.clone())
		.context("no bucket given (use --bucket or DEMSERVE_BUCKET)")?;
	if bucket.is_empty() {
		bail!("bucket name is empty");
	}
	TileStore::s3_from_env(&bucket)
}

fn validate_index(path: &std::path::Path) -> Result<u8> {
	let index = match SpatialIndex::load(path) {
		Ok(index) => index,
		Err(e) => {
			eprintln!("cannot load index {}: {e}", path.display());
			return Ok(2);
		}
	};

	let report = validate(&index);
	if report.is_ok() {
		println!(
			"index {} is structurally sound: {} tiles in {} campaigns",
			path.display(),
			index.total_tile_count,
			index.campaigns().count()
		);
		Ok(0)
	} else {
		eprintln!("index {} has {} structural problems:", path.display(), report.problems.len());
		for problem in &report.problems {
			eprintln!("  - {problem}");
		}
		Ok(1)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn validate_missing_file_is_critical() {
		let code = validate_index(std::path::Path::new("/nonexistent/index.json")).unwrap();
		assert_eq!(code, 2);
	}

	#[test]
	fn validate_good_index_succeeds() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("index.json");
		let mut index = demserve_index::testing::small_index();
		index.save_atomic(&path).unwrap();
		assert_eq!(validate_index(&path).unwrap(), 0);

		// Corrupt a count and the same file fails with code 1.
		index.total_tile_count += 5;
		index.save_atomic(&path).unwrap();
		assert_eq!(validate_index(&path).unwrap(), 1);
	}

	#[test]
	fn validate_schema_mismatch_is_critical() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("index.json");
		std::fs::write(
			&path,
			r#"{"schema_version":"9.9","generated_at":"2024-01-01T00:00:00Z","bucket":"b","total_tile_count":0,"collections":[]}"#,
		)
		.unwrap();
		assert_eq!(validate_index(&path).unwrap(), 2);
	}
}
