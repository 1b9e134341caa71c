// ---------------------------------------------------------------------------
// FittedEngine — immutable bundle of catalog, vectorizer and both models
// ---------------------------------------------------------------------------
//
// `FittedEngine::fit` is the only way to obtain one, so a query can never
// run against partially built state. Callers share an engine behind an `Arc`
// and replace it wholesale on re-fit.
// ---------------------------------------------------------------------------

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::catalog::Catalog;
use crate::collaborative::CollaborativeModel;
use crate::config::EngineConfig;
use crate::content::ContentModel;
use crate::error::RecommendError;
use crate::features::{extract_features, TfidfVectorizer};
use crate::fusion::{fuse, validate_weight};
use crate::types::{Book, RatingEvent, ScoredRecommendation};

/// Outcome of a query keyed by free-text title: `None` when the title
/// matched no book.
pub type TitleLookup = Option<(Book, Vec<ScoredRecommendation>)>;

/// Sizes of the fitted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
	pub items: usize,
	pub users: usize,
	pub rated_items: usize,
	pub features: usize,
}

/// Per-request overrides for a hybrid query.
#[derive(Debug, Clone, Copy, Default)]
pub struct HybridOptions {
	pub k: Option<usize>,
	pub content_weight: Option<f64>,
	pub candidate_pool: Option<usize>,
}

#[derive(Debug)]
pub struct FittedEngine {
	config: EngineConfig,
	catalog: Arc<Catalog>,
	vectorizer: TfidfVectorizer,
	content: ContentModel,
	collaborative: CollaborativeModel,
}

impl FittedEngine {
	/// Extract features, build both models and return the finished engine.
	///
	/// With `ratings == None`, one rating per rated catalog record is derived
	/// for the synthetic user `record index mod user_population`. Explicit
	/// ratings must use user ids inside the population.
	pub fn fit(
		catalog: Catalog,
		ratings: Option<Vec<RatingEvent>>,
		config: EngineConfig,
	) -> Result<Self, RecommendError> {
		if catalog.is_empty() {
			return Err(RecommendError::EmptyCatalog);
		}
		if config.user_population == 0 {
			return Err(RecommendError::InvalidParams(
				"userPopulation must be at least 1".into(),
			));
		}
		validate_weight(config.content_weight)?;

		let started = Instant::now();
		let ratings = match ratings {
			Some(events) => {
				if let Some(bad) = events.iter().find(|e| e.user_id >= config.user_population) {
					return Err(RecommendError::InvalidParams(format!(
						"rating for user {} is outside the population of {}",
						bad.user_id, config.user_population
					)));
				}
				if let Some(bad) = events.iter().find(|e| !e.rating.is_finite()) {
					return Err(RecommendError::InvalidParams(format!(
						"rating for user {} on book {} is not a finite number",
						bad.user_id, bad.book_id
					)));
				}
				events
			}
			None => catalog.synthetic_ratings(config.user_population),
		};

		let catalog = Arc::new(catalog);
		let (vectorizer, features) = extract_features(catalog.books(), config.text_fields.as_slice());
		let content = ContentModel::fit(features, Arc::clone(&catalog))?;
		let collaborative = CollaborativeModel::fit(&ratings, Arc::clone(&catalog));

		let engine = Self {
			config,
			catalog,
			vectorizer,
			content,
			collaborative,
		};
		let stats = engine.stats();
		tracing::info!(
			items = stats.items,
			users = stats.users,
			rated_items = stats.rated_items,
			features = stats.features,
			elapsed_ms = started.elapsed().as_millis() as u64,
			"Recommendation engine fitted"
		);
		Ok(engine)
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	pub fn catalog(&self) -> &Catalog {
		&self.catalog
	}

	pub fn content(&self) -> &ContentModel {
		&self.content
	}

	pub fn collaborative(&self) -> &CollaborativeModel {
		&self.collaborative
	}

	pub fn stats(&self) -> EngineStats {
		EngineStats {
			items: self.catalog.len(),
			users: self.collaborative.matrix().user_count(),
			rated_items: self.collaborative.matrix().item_count(),
			features: self.vectorizer.vocabulary_len(),
		}
	}

	/// Check a user id against the synthetic population.
	pub fn validate_user(&self, user_id: u32) -> Result<u32, RecommendError> {
		if user_id < self.config.user_population {
			Ok(user_id)
		} else {
			Err(self.invalid_user())
		}
	}

	/// Accept a user id given as a JSON number or a numeric string.
	pub fn parse_user_id(&self, raw: &serde_json::Value) -> Result<u32, RecommendError> {
		let parsed = match raw {
			serde_json::Value::Number(n) => n.as_u64(),
			serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
			_ => None,
		};
		parsed
			.and_then(|id| u32::try_from(id).ok())
			.ok_or_else(|| self.invalid_user())
			.and_then(|id| self.validate_user(id))
	}

	fn invalid_user(&self) -> RecommendError {
		RecommendError::InvalidUserId {
			max: self.config.user_population.saturating_sub(1),
		}
	}

	fn k_or_default(&self, k: Option<usize>) -> usize {
		k.unwrap_or(self.config.default_k)
	}

	// -- Query entry points --------------------------------------------------

	/// Books similar to `book_id`; empty when the id is unknown.
	pub fn recommend_by_item(&self, book_id: &str, k: Option<usize>) -> Vec<ScoredRecommendation> {
		self.content.recommend(book_id, self.k_or_default(k))
	}

	/// Books similar to the first title matching `title`.
	pub fn recommend_by_content(&self, title: &str, k: Option<usize>) -> TitleLookup {
		let book = self.catalog.find_by_title(title)?.clone();
		tracing::debug!(title, book_id = %book.book_id, "Content recommendation");
		let recs = self.recommend_by_item(&book.book_id, k);
		Some((book, recs))
	}

	/// Personalized picks for `user_id`; empty when the user has no ratings
	/// or has rated everything.
	pub fn recommend_by_user(
		&self,
		user_id: u32,
		k: Option<usize>,
	) -> Result<Vec<ScoredRecommendation>, RecommendError> {
		let user_id = self.validate_user(user_id)?;
		tracing::debug!(user_id, "Collaborative recommendation");
		Ok(self.collaborative.recommend(user_id, self.k_or_default(k)))
	}

	/// Blend content similarity to `title` with collaborative picks for
	/// `user_id`. `Ok(None)` when the title matched no book.
	pub fn recommend_hybrid(
		&self,
		user_id: u32,
		title: &str,
		options: HybridOptions,
	) -> Result<TitleLookup, RecommendError> {
		let user_id = self.validate_user(user_id)?;
		let content_weight = validate_weight(
			options.content_weight.unwrap_or(self.config.content_weight),
		)?;
		let Some(book) = self.catalog.find_by_title(title) else {
			return Ok(None);
		};

		let pool = options.candidate_pool.unwrap_or(self.config.candidate_pool);
		let content = self.content.recommend(&book.book_id, pool);
		let collaborative = self.collaborative.recommend(user_id, pool);
		tracing::debug!(
			user_id,
			book_id = %book.book_id,
			content = content.len(),
			collaborative = collaborative.len(),
			"Hybrid recommendation"
		);

		let fused = fuse(content, collaborative, content_weight, self.k_or_default(options.k))?;
		Ok(Some((book.clone(), fused)))
	}

	/// Books whose features best match free text.
	pub fn recommend_by_text(&self, text: &str, k: Option<usize>) -> Vec<ScoredRecommendation> {
		let query = self.vectorizer.transform(text);
		self.content.recommend_by_vector(&query, self.k_or_default(k))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::Strategy;

	fn book(id: &str, title: &str, authors: &str, description: &str, rating: f64) -> Book {
		Book {
			book_id: id.into(),
			title: title.into(),
			authors: authors.into(),
			description: Some(description.into()),
			rating: Some(rating),
			num_ratings: Some(100),
		}
	}

	fn library() -> Catalog {
		Catalog::new(vec![
			book("1", "Dune", "Frank Herbert", "desert planet spice empire", 4.3),
			book("2", "Dune Messiah", "Frank Herbert", "spice empire prophecy", 3.9),
			book("3", "Emma", "Jane Austen", "matchmaking village romance", 4.0),
			book("4", "Persuasion", "Jane Austen", "romance navy second chances", 4.1),
			book("5", "Foundation", "Isaac Asimov", "galactic empire psychohistory", 4.2),
		])
	}

	fn explicit_ratings() -> Vec<RatingEvent> {
		let ev = |user_id, book_id: &str, rating| RatingEvent {
			user_id,
			book_id: book_id.into(),
			rating,
		};
		vec![
			ev(0, "1", 5.0),
			ev(0, "3", 2.0),
			ev(1, "1", 4.0),
			ev(1, "2", 5.0),
			ev(1, "5", 4.0),
			ev(2, "3", 5.0),
			ev(2, "4", 4.0),
		]
	}

	fn engine() -> FittedEngine {
		FittedEngine::fit(library(), Some(explicit_ratings()), EngineConfig::default()).unwrap()
	}

	#[test]
	fn engine_is_shareable_across_threads() {
		fn assert_send_sync<T: Send + Sync>() {}
		assert_send_sync::<FittedEngine>();
	}

	#[test]
	fn fit_rejects_empty_catalog_and_bad_users() {
		let err = FittedEngine::fit(Catalog::default(), None, EngineConfig::default()).unwrap_err();
		assert!(matches!(err, RecommendError::EmptyCatalog));

		let ratings = vec![RatingEvent {
			user_id: 100,
			book_id: "1".into(),
			rating: 3.0,
		}];
		let err = FittedEngine::fit(library(), Some(ratings), EngineConfig::default()).unwrap_err();
		assert!(matches!(err, RecommendError::InvalidParams(_)));

		let ratings = vec![RatingEvent {
			user_id: 0,
			book_id: "1".into(),
			rating: f64::NAN,
		}];
		let err = FittedEngine::fit(library(), Some(ratings), EngineConfig::default()).unwrap_err();
		assert!(matches!(err, RecommendError::InvalidParams(_)));
	}

	#[test]
	fn synthetic_ratings_spread_over_population() {
		let config = EngineConfig {
			user_population: 2,
			..EngineConfig::default()
		};
		let e = FittedEngine::fit(library(), None, config).unwrap();
		assert_eq!(e.stats().users, 2);
		assert_eq!(e.stats().rated_items, 5);
		// Records 0, 2, 4 belong to user 0.
		let recs = e.recommend_by_user(0, Some(10)).unwrap();
		let ids: Vec<&str> = recs.iter().map(|r| r.book_id.as_str()).collect();
		assert_eq!(recs.len(), 2);
		assert!(ids.contains(&"2") && ids.contains(&"4"));
	}

	#[test]
	fn content_by_title() {
		let e = engine();
		let (seed, recs) = e.recommend_by_content("dune messiah", Some(1)).unwrap();
		assert_eq!(seed.book_id, "2");
		assert_eq!(recs[0].book_id, "1");
		assert!(e.recommend_by_content("Ulysses", None).is_none());
	}

	#[test]
	fn content_by_item_defaults_k() {
		let e = engine();
		let recs = e.recommend_by_item("1", None);
		assert_eq!(recs.len(), 4);
		assert!(recs.iter().all(|r| r.book_id != "1"));
		assert!(e.recommend_by_item("missing", None).is_empty());
	}

	#[test]
	fn user_queries_validate_range() {
		let e = engine();
		assert!(e.recommend_by_user(99, None).unwrap().is_empty());
		let err = e.recommend_by_user(999, None).unwrap_err();
		assert!(matches!(err, RecommendError::InvalidUserId { max: 99 }));
	}

	#[test]
	fn user_queries_skip_rated_books() {
		let e = engine();
		let recs = e.recommend_by_user(0, None).unwrap();
		assert!(!recs.is_empty());
		assert!(recs.iter().all(|r| r.book_id != "1" && r.book_id != "3"));
		assert!(recs.iter().all(|r| r.source == Strategy::Collaborative));
	}

	#[test]
	fn parse_user_ids() {
		let e = engine();
		assert_eq!(e.parse_user_id(&serde_json::json!(7)).unwrap(), 7);
		assert_eq!(e.parse_user_id(&serde_json::json!(" 42 ")).unwrap(), 42);
		for bad in [
			serde_json::json!("abc"),
			serde_json::json!(-1),
			serde_json::json!(1.5),
			serde_json::json!(100),
			serde_json::json!(null),
		] {
			assert!(matches!(
				e.parse_user_id(&bad),
				Err(RecommendError::InvalidUserId { .. })
			));
		}
	}

	#[test]
	fn hybrid_blends_both_strategies() {
		let e = engine();
		let (seed, recs) = e
			.recommend_hybrid(0, "Dune", HybridOptions::default())
			.unwrap()
			.unwrap();
		assert_eq!(seed.book_id, "1");
		assert!(recs.len() <= 5);
		assert!(recs.iter().all(|r| r.weighted_score.is_some()));
		let mut ids: Vec<&str> = recs.iter().map(|r| r.book_id.as_str()).collect();
		ids.sort_unstable();
		ids.dedup();
		assert_eq!(ids.len(), recs.len());
	}

	#[test]
	fn hybrid_weight_extremes() {
		let e = engine();
		let content_only = e
			.recommend_hybrid(
				0,
				"Dune",
				HybridOptions {
					content_weight: Some(1.0),
					..HybridOptions::default()
				},
			)
			.unwrap()
			.unwrap()
			.1;
		let plain = e.recommend_by_item("1", None);
		let a: Vec<&str> = content_only.iter().map(|r| r.book_id.as_str()).collect();
		let b: Vec<&str> = plain.iter().map(|r| r.book_id.as_str()).collect();
		assert_eq!(a, b);

		let err = e
			.recommend_hybrid(
				0,
				"Dune",
				HybridOptions {
					content_weight: Some(1.2),
					..HybridOptions::default()
				},
			)
			.unwrap_err();
		assert!(matches!(err, RecommendError::InvalidWeight(_)));
	}

	#[test]
	fn hybrid_unknown_title_is_none() {
		let e = engine();
		assert!(e
			.recommend_hybrid(0, "Ulysses", HybridOptions::default())
			.unwrap()
			.is_none());
	}

	#[test]
	fn hybrid_candidate_pool_is_independent_of_k() {
		let e = engine();
		let recs = e
			.recommend_hybrid(
				1,
				"Emma",
				HybridOptions {
					k: Some(10),
					candidate_pool: Some(1),
					..HybridOptions::default()
				},
			)
			.unwrap()
			.unwrap()
			.1;
		assert!(recs.len() <= 2);
	}

	#[test]
	fn text_query_ranks_matching_books() {
		let e = engine();
		let recs = e.recommend_by_text("jane austen romance", Some(2));
		let ids: Vec<&str> = recs.iter().map(|r| r.book_id.as_str()).collect();
		assert_eq!(ids.len(), 2);
		assert!(ids.contains(&"3") && ids.contains(&"4"));
	}
}
