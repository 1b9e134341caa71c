// ---------------------------------------------------------------------------
// RecommendServer — JSON-RPC dispatcher
// ---------------------------------------------------------------------------
//
// Routes incoming JSON-RPC 2.0 requests (NDJSON over stdin) to a
// FittedEngine: a main `run()` loop, a `dispatch()` match, a `with_engine`
// accessor, and free-standing handler functions for each method.
//
// Not-found lookups answer with `"found": false` and an empty result list.
// An out-of-range or non-numeric user id answers the same way plus a
// human-readable `message`. Only querying before `engine/fit` is an error.
// ---------------------------------------------------------------------------

use std::io::{self, BufRead};
use std::sync::Arc;

use serde::Deserialize;

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::engine::{FittedEngine, HybridOptions};
use crate::error::RecommendError;
use crate::protocol::*;
use crate::transport::NdjsonTransport;
use crate::types::{Book, RatingEvent, ScoredRecommendation};

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// JSON-RPC server that dispatches requests to the current [`FittedEngine`].
pub struct RecommendServer {
	transport: NdjsonTransport,
	defaults: EngineConfig,
	engine: Option<Arc<FittedEngine>>,
}

impl RecommendServer {
	/// Create a new server. Nothing is fitted until `engine/fit` is called
	/// or [`RecommendServer::fit_catalog`] runs at startup.
	pub fn new(transport: NdjsonTransport, defaults: EngineConfig) -> Self {
		Self {
			transport,
			defaults,
			engine: None,
		}
	}

	/// Load a CSV catalog and fit it with the server defaults.
	pub fn fit_catalog(&mut self, path: &str, sample_size: Option<usize>) -> Result<(), RecommendError> {
		let catalog = Catalog::load_csv(path, sample_size)?;
		let engine = FittedEngine::fit(catalog, None, self.defaults.clone())?;
		self.engine = Some(Arc::new(engine));
		Ok(())
	}

	/// Snapshot of the current engine, if fitted.
	pub fn engine(&self) -> Option<Arc<FittedEngine>> {
		self.engine.clone()
	}

	/// Main loop: read JSON-RPC messages from stdin, dispatch to handlers.
	pub fn run(&mut self) -> Result<(), RecommendError> {
		let stdin = io::stdin();
		let reader = stdin.lock();

		for line_result in reader.lines() {
			let line = line_result?;
			if line.trim().is_empty() {
				continue;
			}

			let request: JsonRpcRequest = match serde_json::from_str(&line) {
				Ok(r) => r,
				Err(e) => {
					tracing::error!("Failed to parse request: {}", e);
					continue;
				}
			};

			self.dispatch(request);
		}

		Ok(())
	}

	// ── Dispatch ──────────────────────────────────────────────────────────

	fn dispatch(&mut self, req: JsonRpcRequest) {
		let id = req.id;
		let result = match req.method.as_str() {
			// -- Lifecycle -----------------------------------------------
			"engine/fit" => self.handle_fit(req.params),
			"engine/status" => Ok(self.status()),

			// -- Catalog -------------------------------------------------
			"catalog/search" => self.with_engine(|e| handle_catalog_search(e, req.params)),
			"catalog/topRated" => self.with_engine(|e| handle_top_rated(e, req.params)),

			// -- Recommendation ------------------------------------------
			"recommend/content" => self.with_engine(|e| handle_recommend_content(e, req.params)),
			"recommend/item" => self.with_engine(|e| handle_recommend_item(e, req.params)),
			"recommend/user" => self.with_engine(|e| handle_recommend_user(e, req.params)),
			"recommend/hybrid" => self.with_engine(|e| handle_recommend_hybrid(e, req.params)),
			"recommend/text" => self.with_engine(|e| handle_recommend_text(e, req.params)),

			// -- Unknown -------------------------------------------------
			_ => {
				self.transport.write_error(
					id,
					METHOD_NOT_FOUND,
					format!("Unknown method: {}", req.method),
					None,
				);
				return;
			}
		};

		match result {
			Ok(value) => self.transport.write_response(id, value),
			Err(e) => {
				let code = match e {
					RecommendError::InvalidParams(_) => INVALID_PARAMS,
					_ => RECOMMEND_ERROR,
				};
				self.transport
					.write_error(id, code, e.to_string(), Some(e.to_json_rpc_error()))
			}
		}
	}

	// ── Engine accessor ───────────────────────────────────────────────────

	fn with_engine<F>(&self, f: F) -> Result<serde_json::Value, RecommendError>
	where
		F: FnOnce(&FittedEngine) -> Result<serde_json::Value, RecommendError>,
	{
		match &self.engine {
			Some(e) => f(e),
			None => Err(RecommendError::NotFitted),
		}
	}

	fn status(&self) -> serde_json::Value {
		match &self.engine {
			Some(e) => serde_json::json!({ "fitted": true, "stats": e.stats() }),
			None => serde_json::json!({ "fitted": false }),
		}
	}

	// ── Fit ───────────────────────────────────────────────────────────────

	fn handle_fit(&mut self, params: serde_json::Value) -> Result<serde_json::Value, RecommendError> {
		let p: FitParams = parse_params(params)?;

		let catalog = match (p.catalog_path, p.books) {
			(Some(path), None) => Catalog::load_csv(path, p.sample_size)?,
			(None, Some(mut books)) => {
				if let Some(n) = p.sample_size {
					books.truncate(n);
				}
				Catalog::new(books)
			}
			_ => {
				return Err(RecommendError::InvalidParams(
					"exactly one of catalogPath or books is required".into(),
				))
			}
		};

		let defaults = &self.defaults;
		let config = EngineConfig {
			user_population: p.user_population.unwrap_or(defaults.user_population),
			content_weight: p.content_weight.unwrap_or(defaults.content_weight),
			candidate_pool: p.candidate_pool.unwrap_or(defaults.candidate_pool),
			default_k: p.default_k.unwrap_or(defaults.default_k),
			text_fields: p.text_fields.unwrap_or_else(|| defaults.text_fields.clone()),
		};

		// Build the replacement completely before swapping it in; a failed
		// fit leaves the previous engine serving.
		let engine = FittedEngine::fit(catalog, p.ratings, config)?;
		let stats = engine.stats();
		self.engine = Some(Arc::new(engine));

		Ok(serde_json::json!({ "stats": stats }))
	}
}

// ---------------------------------------------------------------------------
// Param types
// ---------------------------------------------------------------------------

fn parse_params<T: serde::de::DeserializeOwned>(
	params: serde_json::Value,
) -> Result<T, RecommendError> {
	serde_json::from_value(params).map_err(|e| RecommendError::InvalidParams(e.to_string()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FitParams {
	catalog_path: Option<String>,
	books: Option<Vec<Book>>,
	ratings: Option<Vec<RatingEvent>>,
	sample_size: Option<usize>,
	text_fields: Option<Vec<String>>,
	user_population: Option<u32>,
	content_weight: Option<f64>,
	candidate_pool: Option<usize>,
	default_k: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogSearchParams {
	query: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopRatedParams {
	limit: Option<usize>,
	min_ratings: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentParams {
	title: String,
	k: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemParams {
	book_id: String,
	k: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserParams {
	#[serde(default)]
	user_id: serde_json::Value,
	k: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HybridParams {
	#[serde(default)]
	user_id: serde_json::Value,
	title: String,
	k: Option<usize>,
	content_weight: Option<f64>,
	candidate_pool: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextParams {
	text: String,
	k: Option<usize>,
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn results(recs: &[ScoredRecommendation]) -> serde_json::Value {
	serde_json::json!({ "found": true, "results": recs })
}

fn not_found() -> serde_json::Value {
	serde_json::json!({ "found": false, "results": [] })
}

fn seeded_results(lookup: Option<(Book, Vec<ScoredRecommendation>)>) -> serde_json::Value {
	match lookup {
		Some((book, recs)) => serde_json::json!({ "found": true, "book": book, "results": recs }),
		None => not_found(),
	}
}

/// Turn an invalid user id into a user-visible message instead of an error.
fn invalid_user_message(
	outcome: Result<serde_json::Value, RecommendError>,
) -> Result<serde_json::Value, RecommendError> {
	match outcome {
		Err(e @ RecommendError::InvalidUserId { .. }) => Ok(serde_json::json!({
			"found": false,
			"results": [],
			"message": e.to_string(),
		})),
		other => other,
	}
}

// ---------------------------------------------------------------------------
// Free-standing handler functions
// ---------------------------------------------------------------------------

fn handle_catalog_search(
	engine: &FittedEngine,
	params: serde_json::Value,
) -> Result<serde_json::Value, RecommendError> {
	let p: CatalogSearchParams = parse_params(params)?;
	let book = engine.catalog().find_by_title(&p.query);
	Ok(serde_json::json!({ "book": book }))
}

fn handle_top_rated(
	engine: &FittedEngine,
	params: serde_json::Value,
) -> Result<serde_json::Value, RecommendError> {
	let p: TopRatedParams = parse_params(params)?;
	let books = engine
		.catalog()
		.top_rated(p.limit.unwrap_or(10), p.min_ratings.unwrap_or(50));
	Ok(serde_json::json!({ "books": books }))
}

fn handle_recommend_content(
	engine: &FittedEngine,
	params: serde_json::Value,
) -> Result<serde_json::Value, RecommendError> {
	let p: ContentParams = parse_params(params)?;
	Ok(seeded_results(engine.recommend_by_content(&p.title, p.k)))
}

fn handle_recommend_item(
	engine: &FittedEngine,
	params: serde_json::Value,
) -> Result<serde_json::Value, RecommendError> {
	let p: ItemParams = parse_params(params)?;
	if engine.catalog().position(&p.book_id).is_none() {
		return Ok(not_found());
	}
	Ok(results(&engine.recommend_by_item(&p.book_id, p.k)))
}

fn handle_recommend_user(
	engine: &FittedEngine,
	params: serde_json::Value,
) -> Result<serde_json::Value, RecommendError> {
	let p: UserParams = parse_params(params)?;
	invalid_user_message(
		engine
			.parse_user_id(&p.user_id)
			.and_then(|user_id| engine.recommend_by_user(user_id, p.k))
			.map(|recs| results(&recs)),
	)
}

fn handle_recommend_hybrid(
	engine: &FittedEngine,
	params: serde_json::Value,
) -> Result<serde_json::Value, RecommendError> {
	let p: HybridParams = parse_params(params)?;
	let options = HybridOptions {
		k: p.k,
		content_weight: p.content_weight,
		candidate_pool: p.candidate_pool,
	};
	invalid_user_message(
		engine
			.parse_user_id(&p.user_id)
			.and_then(|user_id| engine.recommend_hybrid(user_id, &p.title, options))
			.map(seeded_results),
	)
}

fn handle_recommend_text(
	engine: &FittedEngine,
	params: serde_json::Value,
) -> Result<serde_json::Value, RecommendError> {
	let p: TextParams = parse_params(params)?;
	Ok(results(&engine.recommend_by_text(&p.text, p.k)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn engine() -> FittedEngine {
		let books: Vec<Book> = serde_json::from_value(json!([
			{ "bookId": "a", "title": "The Hobbit", "author": "J.R.R. Tolkien",
			  "description": "dragon treasure journey", "rating": 4.3, "numRatings": 90 },
			{ "bookId": "b", "title": "The Silmarillion", "author": "J.R.R. Tolkien",
			  "description": "elves jewels dragon", "rating": 3.9, "numRatings": 40 },
			{ "bookId": "c", "title": "Neuromancer", "author": "William Gibson",
			  "description": "cyberspace hacker", "rating": 3.9, "numRatings": 70 }
		]))
		.unwrap();
		FittedEngine::fit(Catalog::new(books), None, EngineConfig::default()).unwrap()
	}

	#[test]
	fn content_not_found_is_empty_success() {
		let v = handle_recommend_content(&engine(), json!({ "title": "Dracula" })).unwrap();
		assert_eq!(v["found"], false);
		assert_eq!(v["results"], json!([]));
	}

	#[test]
	fn content_found_names_seed_book() {
		let v = handle_recommend_content(&engine(), json!({ "title": "hobbit", "k": 1 })).unwrap();
		assert_eq!(v["book"]["bookId"], "a");
		assert_eq!(v["results"][0]["bookId"], "b");
	}

	#[test]
	fn invalid_user_becomes_message() {
		let e = engine();
		for user in [json!(999), json!("abc")] {
			let v = handle_recommend_user(&e, json!({ "userId": user })).unwrap();
			assert_eq!(v["found"], false);
			assert_eq!(
				v["message"],
				"Invalid user ID. Please enter a number between 0 and 99."
			);
		}
	}

	#[test]
	fn user_accepts_numeric_string() {
		let v = handle_recommend_user(&engine(), json!({ "userId": "0" })).unwrap();
		assert_eq!(v["found"], true);
		// User 0 rated only book "a".
		let ids: Vec<&str> = v["results"]
			.as_array()
			.unwrap()
			.iter()
			.map(|r| r["bookId"].as_str().unwrap())
			.collect();
		assert!(!ids.contains(&"a"));
	}

	#[test]
	fn hybrid_rejects_bad_weight() {
		let err = handle_recommend_hybrid(
			&engine(),
			json!({ "userId": 0, "title": "hobbit", "contentWeight": 3.0 }),
		)
		.unwrap_err();
		assert!(matches!(err, RecommendError::InvalidWeight(_)));
	}

	#[test]
	fn top_rated_defaults_min_ratings() {
		let v = handle_top_rated(&engine(), json!({})).unwrap();
		let ids: Vec<&str> = v["books"]
			.as_array()
			.unwrap()
			.iter()
			.map(|b| b["bookId"].as_str().unwrap())
			.collect();
		assert_eq!(ids, vec!["a", "c"]);
	}

	#[test]
	fn missing_params_are_invalid() {
		let err = handle_recommend_text(&engine(), json!({})).unwrap_err();
		assert!(matches!(err, RecommendError::InvalidParams(_)));
	}
}
