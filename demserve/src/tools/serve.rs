//! The `serve` subcommand: boot the engine and run the HTTP server.

use demserve::engine::{Engine, StartupError};
use demserve::server;
use demserve::settings::Settings;
use anyhow::Result;
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
#[command(arg_required_else_help = false)]
pub struct Subcommand {
	/// Address to listen on.
	#[arg(long, default_value = "0.0.0.0")]
	ip: String,

	/// Port to listen on.
	#[arg(long, default_value_t = 8000)]
	port: u16,
}

pub fn run(arguments: &Subcommand) -> Result<u8> {
	let runtime = tokio::runtime::Runtime::new()?;
	runtime.block_on(async {
		let settings = Settings::from_env()?;
		let engine = match Engine::load(&settings) {
			Ok(engine) => Arc::new(engine),
			Err(StartupError::Index(e)) => {
				// A broken or mismatched index must never serve.
				log::error!("refusing to start: {e}");
				return Ok(2);
			}
			Err(StartupError::Other(e)) => return Err(e),
		};
		server::serve(engine, &arguments.ip, arguments.port).await?;
		Ok(0)
	})
}
