// ---------------------------------------------------------------------------
// Collaborative recommender — item-item similarity over the user x item matrix
// ---------------------------------------------------------------------------
//
// Fit builds a dense ratings matrix (absent = 0.0) with an explicit rated
// mask, then materializes the full item x item cosine similarity matrix over
// rating columns. Prediction for an unrated item j of user u:
//
//   sum_i sim(j, i) * r(u, i) / sum_i |sim(j, i)|     over items i rated by u
//
// with an epsilon denominator when every similarity is zero.
// ---------------------------------------------------------------------------

use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::cosine::{compute_magnitude, cosine_similarity_with_magnitude};
use crate::error::RecommendError;
use crate::types::{RatingEvent, ScoredRecommendation, Strategy};

/// Denominator substituted when a prediction's similarity mass is zero.
pub const SIMILARITY_EPSILON: f64 = 1e-10;

// ---------------------------------------------------------------------------
// UserItemMatrix
// ---------------------------------------------------------------------------

/// Dense users x items ratings with explicit rated flags.
///
/// Users are indexed in ascending id order; items in catalog order. Only
/// items with at least one rating event get a column.
#[derive(Debug, Clone, Default)]
pub struct UserItemMatrix {
	users: Vec<u32>,
	items: Vec<usize>,
	user_index: HashMap<u32, usize>,
	item_index: HashMap<usize, usize>,
	values: Vec<f64>,
	rated: Vec<bool>,
}

impl UserItemMatrix {
	/// Build from rating events. Events for books missing from the catalog,
	/// and non-finite ratings, are skipped. A repeated (user, book) pair keeps
	/// the last rating.
	pub fn from_events(events: &[RatingEvent], catalog: &Catalog) -> Self {
		let mut resolved: Vec<(u32, usize, f64)> = Vec::with_capacity(events.len());
		let mut unknown = 0usize;
		let mut non_finite = 0usize;
		for event in events {
			if !event.rating.is_finite() {
				non_finite += 1;
				continue;
			}
			match catalog.position(&event.book_id) {
				Some(pos) => resolved.push((event.user_id, pos, event.rating)),
				None => unknown += 1,
			}
		}
		if unknown > 0 {
			tracing::warn!(unknown, "Skipped rating events for books not in the catalog");
		}
		if non_finite > 0 {
			tracing::warn!(non_finite, "Skipped rating events with non-finite ratings");
		}

		let mut users: Vec<u32> = resolved.iter().map(|(u, _, _)| *u).collect();
		users.sort_unstable();
		users.dedup();
		let mut items: Vec<usize> = resolved.iter().map(|(_, i, _)| *i).collect();
		items.sort_unstable();
		items.dedup();

		let user_index: HashMap<u32, usize> =
			users.iter().enumerate().map(|(idx, u)| (*u, idx)).collect();
		let item_index: HashMap<usize, usize> =
			items.iter().enumerate().map(|(idx, i)| (*i, idx)).collect();

		let cells = users.len() * items.len();
		let mut values = vec![0.0; cells];
		let mut rated = vec![false; cells];
		for (user, pos, rating) in resolved {
			let cell = user_index[&user] * items.len() + item_index[&pos];
			values[cell] = rating;
			rated[cell] = true;
		}

		Self {
			users,
			items,
			user_index,
			item_index,
			values,
			rated,
		}
	}

	pub fn user_count(&self) -> usize {
		self.users.len()
	}

	pub fn item_count(&self) -> usize {
		self.items.len()
	}

	/// Ascending user ids; row `r` belongs to `users()[r]`.
	pub fn users(&self) -> &[u32] {
		&self.users
	}

	pub fn user_row(&self, user_id: u32) -> Option<usize> {
		self.user_index.get(&user_id).copied()
	}

	/// Matrix column of a catalog position, if that book has any rating.
	pub fn item_column(&self, catalog_pos: usize) -> Option<usize> {
		self.item_index.get(&catalog_pos).copied()
	}

	/// Catalog position backing column `col`.
	pub fn catalog_position(&self, col: usize) -> Option<usize> {
		self.items.get(col).copied()
	}

	/// Rating stored for (user, catalog position); `None` when never rated,
	/// even though the dense cell reads 0.0.
	pub fn rating(&self, user_id: u32, catalog_pos: usize) -> Option<f64> {
		let row = self.user_row(user_id)?;
		let col = self.item_column(catalog_pos)?;
		let cell = row * self.items.len() + col;
		self.rated[cell].then_some(self.values[cell])
	}

	fn row_values(&self, row: usize) -> &[f64] {
		let n = self.items.len();
		&self.values[row * n..(row + 1) * n]
	}

	fn row_rated(&self, row: usize) -> &[bool] {
		let n = self.items.len();
		&self.rated[row * n..(row + 1) * n]
	}

	/// Column `col` across all users (dense, absent = 0.0).
	pub fn column(&self, col: usize) -> Vec<f64> {
		(0..self.users.len())
			.map(|row| self.values[row * self.items.len() + col])
			.collect()
	}
}

// ---------------------------------------------------------------------------
// SimilarityMatrix
// ---------------------------------------------------------------------------

/// Square, symmetric item x item similarity matrix stored row-major.
#[derive(Debug, Clone, Default)]
pub struct SimilarityMatrix {
	n: usize,
	values: Vec<f64>,
}

impl SimilarityMatrix {
	/// Pairwise cosine similarity of every matrix column. O(items^2 * users).
	pub fn from_columns(matrix: &UserItemMatrix) -> Self {
		let n = matrix.item_count();
		let columns: Vec<Vec<f64>> = (0..n).map(|c| matrix.column(c)).collect();
		let magnitudes: Vec<f64> = columns.iter().map(|c| compute_magnitude(c)).collect();

		let mut values = vec![0.0; n * n];
		for i in 0..n {
			for j in i..n {
				let sim = cosine_similarity_with_magnitude(
					&columns[i],
					&columns[j],
					magnitudes[i],
					magnitudes[j],
				);
				values[i * n + j] = sim;
				values[j * n + i] = sim;
			}
		}
		Self { n, values }
	}

	/// Build from explicit rows. Fails unless `rows` is square.
	pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, RecommendError> {
		let n = rows.len();
		if let Some(bad) = rows.iter().find(|r| r.len() != n) {
			return Err(RecommendError::DimensionMismatch {
				rows: bad.len(),
				items: n,
			});
		}
		Ok(Self {
			n,
			values: rows.into_iter().flatten().collect(),
		})
	}

	pub fn len(&self) -> usize {
		self.n
	}

	pub fn is_empty(&self) -> bool {
		self.n == 0
	}

	pub fn get(&self, i: usize, j: usize) -> f64 {
		self.values[i * self.n + j]
	}

	pub fn row(&self, i: usize) -> &[f64] {
		&self.values[i * self.n..(i + 1) * self.n]
	}
}

// ---------------------------------------------------------------------------
// CollaborativeModel
// ---------------------------------------------------------------------------

/// A fitted item-item collaborative model. Immutable once built.
#[derive(Debug, Clone)]
pub struct CollaborativeModel {
	matrix: UserItemMatrix,
	similarity: SimilarityMatrix,
	catalog: Arc<Catalog>,
}

impl CollaborativeModel {
	/// Build the ratings matrix and its item-item similarity matrix.
	pub fn fit(events: &[RatingEvent], catalog: Arc<Catalog>) -> Self {
		let matrix = UserItemMatrix::from_events(events, &catalog);
		let similarity = SimilarityMatrix::from_columns(&matrix);
		tracing::debug!(
			users = matrix.user_count(),
			items = matrix.item_count(),
			"Collaborative model fitted"
		);
		Self {
			matrix,
			similarity,
			catalog,
		}
	}

	/// Assemble a model around a precomputed similarity matrix, which must
	/// match the ratings matrix's item count.
	pub fn from_parts(
		events: &[RatingEvent],
		similarity: SimilarityMatrix,
		catalog: Arc<Catalog>,
	) -> Result<Self, RecommendError> {
		let matrix = UserItemMatrix::from_events(events, &catalog);
		if similarity.len() != matrix.item_count() {
			return Err(RecommendError::DimensionMismatch {
				rows: similarity.len(),
				items: matrix.item_count(),
			});
		}
		Ok(Self {
			matrix,
			similarity,
			catalog,
		})
	}

	pub fn matrix(&self) -> &UserItemMatrix {
		&self.matrix
	}

	pub fn similarity(&self) -> &SimilarityMatrix {
		&self.similarity
	}

	/// Predicted rating of every column for `user_id`, or `None` for an
	/// unknown user.
	pub fn predict(&self, user_id: u32) -> Option<Vec<f64>> {
		let row = self.matrix.user_row(user_id)?;
		let ratings = self.matrix.row_values(row);
		let rated = self.matrix.row_rated(row);

		let predictions = (0..self.similarity.len())
			.map(|j| {
				let sims = self.similarity.row(j);
				let (weighted, mass) = sims
					.iter()
					.zip(ratings)
					.zip(rated)
					.filter(|(_, is_rated)| **is_rated)
					.fold((0.0, 0.0), |(w, m), ((sim, r), _)| (w + sim * r, m + sim.abs()));
				let denom = if mass == 0.0 { SIMILARITY_EPSILON } else { mass };
				weighted / denom
			})
			.collect();
		Some(predictions)
	}

	/// Top-`k` books `user_id` has not rated, by predicted rating. Unknown
	/// users and users with nothing left to rate get an empty list.
	pub fn recommend(&self, user_id: u32, k: usize) -> Vec<ScoredRecommendation> {
		let Some(predictions) = self.predict(user_id) else {
			tracing::debug!(user_id, "Collaborative query for unknown user");
			return Vec::new();
		};
		let Some(row) = self.matrix.user_row(user_id) else {
			return Vec::new();
		};
		let rated = self.matrix.row_rated(row);

		let mut candidates: Vec<(usize, f64)> = predictions
			.into_iter()
			.enumerate()
			.filter(|(col, _)| !rated[*col])
			.collect();

		candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
		candidates.truncate(k);

		candidates
			.into_iter()
			.filter_map(|(col, score)| {
				self.matrix
					.catalog_position(col)
					.and_then(|pos| self.catalog.get(pos))
					.map(|book| ScoredRecommendation::new(book, score, Strategy::Collaborative))
			})
			.collect()
	}
}
