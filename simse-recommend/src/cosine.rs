// ---------------------------------------------------------------------------
// Linear algebra primitives — dot product, L2 norm, cosine similarity
// ---------------------------------------------------------------------------
//
// Dense routines operate on plain slices (rating columns); sparse routines
// operate on sorted index/value rows (TF-IDF features). Zero-magnitude
// inputs always yield a similarity of 0.0.
// ---------------------------------------------------------------------------

use crate::types::SparseVector;

/// Dot product of two equal-length dense vectors.
/// Returns 0.0 on dimension mismatch.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
	if a.len() != b.len() {
		return 0.0;
	}
	a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Compute the magnitude (L2 norm) of a vector.
pub fn compute_magnitude(v: &[f64]) -> f64 {
	v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Compute cosine similarity between two dense vectors.
/// Returns 0.0 for zero-magnitude vectors or dimension mismatches.
/// Result clamped to [-1.0, 1.0].
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
	if a.len() != b.len() || a.is_empty() {
		return 0.0;
	}
	cosine_similarity_with_magnitude(a, b, compute_magnitude(a), compute_magnitude(b))
}

/// Compute cosine similarity using pre-computed magnitudes.
/// Falls back to returning 0.0 if magnitudes are zero.
pub fn cosine_similarity_with_magnitude(a: &[f64], b: &[f64], mag_a: f64, mag_b: f64) -> f64 {
	if a.len() != b.len() || a.is_empty() {
		return 0.0;
	}
	finish(dot(a, b), mag_a * mag_b)
}

/// Dot product of two sparse rows. Both index lists must be sorted ascending.
pub fn sparse_dot(a: &SparseVector, b: &SparseVector) -> f64 {
	let (ai, av) = (a.indices(), a.values());
	let (bi, bv) = (b.indices(), b.values());
	let (mut i, mut j) = (0, 0);
	let mut sum = 0.0;
	while i < ai.len() && j < bi.len() {
		match ai[i].cmp(&bi[j]) {
			std::cmp::Ordering::Less => i += 1,
			std::cmp::Ordering::Greater => j += 1,
			std::cmp::Ordering::Equal => {
				sum += av[i] * bv[j];
				i += 1;
				j += 1;
			}
		}
	}
	sum
}

/// Cosine similarity of two sparse rows.
pub fn sparse_cosine(a: &SparseVector, b: &SparseVector) -> f64 {
	finish(sparse_dot(a, b), a.magnitude() * b.magnitude())
}

fn finish(dot: f64, denom: f64) -> f64 {
	if denom == 0.0 {
		return 0.0;
	}
	let result = dot / denom;
	if !result.is_finite() {
		return 0.0;
	}
	result.clamp(-1.0, 1.0)
}
