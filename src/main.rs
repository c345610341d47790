//! calendar-broker server binary.

// std
use std::sync::Arc;
// crates.io
use clap::Parser;
// self
use calendar_broker::{
	api,
	config::{Cli, EnvFile},
	obs,
};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let env_file = EnvFile::load();

	obs::install_subscriber();
	env_file.log();

	let config = Cli::parse().into_config()?;
	let state = config.build_state()?;
	let app = api::router(Arc::new(state)).layer(api::cors_layer(&config.allowed_origins));

	api::serve(config.bind, app).await?;

	Ok(())
}
