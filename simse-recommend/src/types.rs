use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Catalog records
// ---------------------------------------------------------------------------

/// A recommendable book. Display attributes are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
	#[serde(rename = "bookId", alias = "book_id")]
	pub book_id: String,
	#[serde(default)]
	pub title: String,
	#[serde(default, rename = "authors", alias = "author")]
	pub authors: String,
	#[serde(default, deserialize_with = "csv::invalid_option")]
	pub description: Option<String>,
	#[serde(default, deserialize_with = "csv::invalid_option")]
	pub rating: Option<f64>,
	#[serde(
		default,
		rename = "numRatings",
		alias = "num_ratings",
		deserialize_with = "csv::invalid_option"
	)]
	pub num_ratings: Option<u64>,
}

impl Book {
	/// Look up a text attribute by column name. Unknown or missing fields
	/// read as the empty string.
	pub fn text_field(&self, name: &str) -> &str {
		match name {
			"title" => &self.title,
			"authors" | "author" => &self.authors,
			"description" => self.description.as_deref().unwrap_or(""),
			"bookId" | "book_id" => &self.book_id,
			_ => "",
		}
	}
}

/// A single (user, book, rating) observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingEvent {
	pub user_id: u32,
	pub book_id: String,
	pub rating: f64,
}

// ---------------------------------------------------------------------------
// Feature vectors
// ---------------------------------------------------------------------------

/// Sparse numeric row with strictly ascending indices and a cached L2 norm.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
	indices: Vec<usize>,
	values: Vec<f64>,
	magnitude: f64,
}

impl SparseVector {
	/// Build from unordered (index, value) pairs. Repeated indices are summed
	/// and explicit zeros dropped.
	pub fn new(mut entries: Vec<(usize, f64)>) -> Self {
		entries.sort_by_key(|(i, _)| *i);
		let mut indices: Vec<usize> = Vec::with_capacity(entries.len());
		let mut values: Vec<f64> = Vec::with_capacity(entries.len());
		for (i, v) in entries {
			if indices.last() == Some(&i) {
				if let Some(last) = values.last_mut() {
					*last += v;
				}
			} else {
				indices.push(i);
				values.push(v);
			}
		}
		let (indices, values): (Vec<usize>, Vec<f64>) = indices
			.into_iter()
			.zip(values)
			.filter(|(_, v)| *v != 0.0)
			.unzip();
		let magnitude = crate::cosine::compute_magnitude(&values);
		Self {
			indices,
			values,
			magnitude,
		}
	}

	pub fn from_dense(dense: &[f64]) -> Self {
		Self::new(dense.iter().copied().enumerate().collect())
	}

	pub fn indices(&self) -> &[usize] {
		&self.indices
	}

	pub fn values(&self) -> &[f64] {
		&self.values
	}

	pub fn magnitude(&self) -> f64 {
		self.magnitude
	}

	pub fn nnz(&self) -> usize {
		self.indices.len()
	}
}

/// One feature row per catalog item, index-aligned with the catalog.
#[derive(Debug, Clone, Default)]
pub struct FeatureMatrix {
	rows: Vec<SparseVector>,
	dim: usize,
}

impl FeatureMatrix {
	pub fn new(rows: Vec<SparseVector>, dim: usize) -> Self {
		Self { rows, dim }
	}

	/// Dense constructor, mostly for callers with precomputed embeddings.
	pub fn from_dense(rows: &[Vec<f64>]) -> Self {
		let dim = rows.iter().map(Vec::len).max().unwrap_or(0);
		Self {
			rows: rows.iter().map(|r| SparseVector::from_dense(r)).collect(),
			dim,
		}
	}

	pub fn row(&self, idx: usize) -> Option<&SparseVector> {
		self.rows.get(idx)
	}

	pub fn rows(&self) -> &[SparseVector] {
		&self.rows
	}

	pub fn len(&self) -> usize {
		self.rows.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}

	/// Number of feature columns.
	pub fn dim(&self) -> usize {
		self.dim
	}
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Which recommender produced a candidate. Declaration order is the
/// fusion tie-break precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
	Content,
	Collaborative,
}

/// A single ranked recommendation.
///
/// `score` is the strategy's raw score (cosine similarity or predicted
/// rating). `normalized_score` and `weighted_score` are only set by hybrid
/// fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredRecommendation {
	pub book_id: String,
	pub title: String,
	pub authors: String,
	pub score: f64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub normalized_score: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub weighted_score: Option<f64>,
	pub source: Strategy,
}

impl ScoredRecommendation {
	pub fn new(book: &Book, score: f64, source: Strategy) -> Self {
		Self {
			book_id: book.book_id.clone(),
			title: book.title.clone(),
			authors: book.authors.clone(),
			score,
			normalized_score: None,
			weighted_score: None,
			source,
		}
	}
}
