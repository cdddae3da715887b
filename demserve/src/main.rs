mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
	author,
	version,
	about,
	long_about = None,
	propagate_version = true,
	disable_help_subcommand = true,
)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[command(flatten)]
	verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Serve elevation and coverage queries via http
	Serve(tools::serve::Subcommand),

	/// Build, update or validate the spatial index
	Index(tools::index::Subcommand),
}

fn main() -> ExitCode {
	let cli = Cli::parse();

	env_logger::Builder::new()
		.filter_level(cli.verbose.log_level_filter())
		.format_timestamp(None)
		.init();

	match run(&cli) {
		Ok(code) => ExitCode::from(code),
		Err(e) => {
			eprintln!("error: {e:#}");
			ExitCode::from(2)
		}
	}
}

fn run(cli: &Cli) -> Result<u8> {
	match &cli.command {
		Commands::Serve(arguments) => tools::serve::run(arguments),
		Commands::Index(arguments) => tools::index::run(arguments),
	}
}
