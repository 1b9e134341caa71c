use clap::Parser;

use crate::catalog::DEFAULT_USER_POPULATION;
use crate::features::DEFAULT_TEXT_FIELDS;
use crate::fusion::{DEFAULT_CANDIDATE_POOL, DEFAULT_CONTENT_WEIGHT};

#[derive(Parser, Debug)]
#[command(
	name = "simse-recommend-engine",
	about = "Book recommendation engine over JSON-RPC 2.0 / NDJSON stdio"
)]
pub struct CliArgs {
	/// Book catalog CSV to fit at startup (otherwise wait for engine/fit)
	#[arg(long, env = "SIMSE_RECOMMEND_CATALOG")]
	pub catalog: Option<String>,

	/// Only read the first N catalog rows
	#[arg(long, env = "SIMSE_RECOMMEND_SAMPLE_SIZE")]
	pub sample_size: Option<usize>,

	/// Number of synthetic users ratings are spread across
	#[arg(long, default_value_t = DEFAULT_USER_POPULATION, env = "SIMSE_RECOMMEND_USER_POPULATION")]
	pub user_population: u32,

	/// Share of the hybrid score given to content similarity (0..=1)
	#[arg(long, default_value_t = DEFAULT_CONTENT_WEIGHT, env = "SIMSE_RECOMMEND_CONTENT_WEIGHT")]
	pub content_weight: f64,

	/// Candidates fetched from each strategy before hybrid fusion
	#[arg(long, default_value_t = DEFAULT_CANDIDATE_POOL, env = "SIMSE_RECOMMEND_CANDIDATE_POOL")]
	pub candidate_pool: usize,

	/// Results returned when a request does not specify k
	#[arg(long, default_value = "5", env = "SIMSE_RECOMMEND_DEFAULT_K")]
	pub default_k: usize,

	/// Log level (trace, debug, info, warn, error)
	#[arg(long, default_value = "info", env = "SIMSE_RECOMMEND_LOG_LEVEL")]
	pub log_level: String,
}

/// Engine-wide defaults, applied whenever a request leaves a knob unset.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
	pub user_population: u32,
	pub content_weight: f64,
	pub candidate_pool: usize,
	pub default_k: usize,
	pub text_fields: Vec<String>,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			user_population: DEFAULT_USER_POPULATION,
			content_weight: DEFAULT_CONTENT_WEIGHT,
			candidate_pool: DEFAULT_CANDIDATE_POOL,
			default_k: 5,
			text_fields: DEFAULT_TEXT_FIELDS.iter().map(|f| f.to_string()).collect(),
		}
	}
}

impl From<&CliArgs> for EngineConfig {
	fn from(args: &CliArgs) -> Self {
		Self {
			user_population: args.user_population,
			content_weight: args.content_weight,
			candidate_pool: args.candidate_pool,
			default_k: args.default_k,
			..Self::default()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cli_defaults_match_engine_defaults() {
		let args = CliArgs::parse_from(["simse-recommend-engine"]);
		assert_eq!(EngineConfig::from(&args), EngineConfig::default());
		assert!(args.catalog.is_none());
		assert_eq!(args.log_level, "info");
	}

	#[test]
	fn tuning_flags_have_env_fallbacks() {
		use clap::CommandFactory;

		let cmd = CliArgs::command();
		for (id, env) in [
			("catalog", "SIMSE_RECOMMEND_CATALOG"),
			("sample_size", "SIMSE_RECOMMEND_SAMPLE_SIZE"),
			("user_population", "SIMSE_RECOMMEND_USER_POPULATION"),
			("content_weight", "SIMSE_RECOMMEND_CONTENT_WEIGHT"),
			("candidate_pool", "SIMSE_RECOMMEND_CANDIDATE_POOL"),
			("default_k", "SIMSE_RECOMMEND_DEFAULT_K"),
			("log_level", "SIMSE_RECOMMEND_LOG_LEVEL"),
		] {
			let arg = cmd
				.get_arguments()
				.find(|a| a.get_id() == id)
				.unwrap_or_else(|| panic!("missing argument {id}"));
			assert_eq!(arg.get_env(), Some(std::ffi::OsStr::new(env)), "{id}");
		}
	}

	#[test]
	fn cli_overrides() {
		let args = CliArgs::parse_from([
			"simse-recommend-engine",
			"--catalog",
			"books.csv",
			"--content-weight",
			"0.8",
			"--candidate-pool",
			"20",
		]);
		let config = EngineConfig::from(&args);
		assert_eq!(args.catalog.as_deref(), Some("books.csv"));
		assert!((config.content_weight - 0.8).abs() < 1e-12);
		assert_eq!(config.candidate_pool, 20);
		assert_eq!(config.text_fields, vec!["title", "authors", "description"]);
	}
}
