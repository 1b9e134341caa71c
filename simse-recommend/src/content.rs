// ---------------------------------------------------------------------------
// Content recommender — item-to-item cosine similarity over feature rows
// ---------------------------------------------------------------------------
//
// Similarities are computed per query against every catalog row; nothing
// item x item is materialized. Ranking is a stable sort, so equal scores
// keep catalog order.
// ---------------------------------------------------------------------------

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::cosine::sparse_cosine;
use crate::error::RecommendError;
use crate::types::{FeatureMatrix, ScoredRecommendation, SparseVector, Strategy};

/// A fitted content model. Immutable; rebuild with [`ContentModel::fit`].
#[derive(Debug, Clone)]
pub struct ContentModel {
	features: FeatureMatrix,
	catalog: Arc<Catalog>,
}

impl ContentModel {
	/// Bind a feature matrix to the catalog it was extracted from. Row `i`
	/// must describe catalog book `i`.
	pub fn fit(features: FeatureMatrix, catalog: Arc<Catalog>) -> Result<Self, RecommendError> {
		if features.len() != catalog.len() {
			return Err(RecommendError::DimensionMismatch {
				rows: features.len(),
				items: catalog.len(),
			});
		}
		Ok(Self { features, catalog })
	}

	pub fn features(&self) -> &FeatureMatrix {
		&self.features
	}

	/// Top-`k` books most similar to `book_id`, never including the book
	/// itself. Unknown ids yield an empty list.
	pub fn recommend(&self, book_id: &str, k: usize) -> Vec<ScoredRecommendation> {
		let Some(query) = self
			.catalog
			.position(book_id)
			.and_then(|idx| self.features.row(idx))
		else {
			tracing::debug!(book_id, "Content query for unknown book");
			return Vec::new();
		};
		self.rank(query, k, Some(book_id))
	}

	/// Top-`k` books most similar to an arbitrary feature vector.
	pub fn recommend_by_vector(&self, query: &SparseVector, k: usize) -> Vec<ScoredRecommendation> {
		self.rank(query, k, None)
	}

	/// Similarity of the query against every row, excluding rows whose book
	/// id equals `exclude`.
	fn rank(&self, query: &SparseVector, k: usize, exclude: Option<&str>) -> Vec<ScoredRecommendation> {
		if k == 0 {
			return Vec::new();
		}

		let mut scored: Vec<(usize, f64)> = self
			.features
			.rows()
			.iter()
			.enumerate()
			.filter(|(idx, _)| match (exclude, self.catalog.get(*idx)) {
				(Some(id), Some(book)) => book.book_id != id,
				_ => true,
			})
			.map(|(idx, row)| (idx, sparse_cosine(query, row)))
			.collect();

		scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
		scored.truncate(k);

		scored
			.into_iter()
			.filter_map(|(idx, score)| {
				self.catalog
					.get(idx)
					.map(|book| ScoredRecommendation::new(book, score, Strategy::Content))
			})
			.collect()
	}
}
