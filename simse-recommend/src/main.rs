use anyhow::Result;
use clap::Parser;
use simse_recommend_engine::config::{CliArgs, EngineConfig};
use simse_recommend_engine::server::RecommendServer;
use simse_recommend_engine::transport::NdjsonTransport;

fn main() -> Result<()> {
	let args = CliArgs::parse();

	// Logs go to stderr; stdout carries the protocol.
	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
		)
		.init();

	let transport = NdjsonTransport::new();
	let mut server = RecommendServer::new(transport, EngineConfig::from(&args));

	if let Some(path) = &args.catalog {
		tracing::info!(catalog = %path, "Fitting catalog at startup");
		server.fit_catalog(path, args.sample_size)?;
	}

	tracing::info!("simse-recommend-engine ready");

	if let Err(e) = server.run() {
		tracing::error!("Server error: {}", e);
		std::process::exit(1);
	}
	Ok(())
}
