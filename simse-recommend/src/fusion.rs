// ---------------------------------------------------------------------------
// Hybrid fusion — blend content and collaborative candidate lists
// ---------------------------------------------------------------------------
//
// Pure functions. Each strategy's raw scores are min-max normalized within
// that strategy's own candidate list, scaled by the strategy weight, merged,
// deduplicated by title (best weighted score wins) and cut to k.
// ---------------------------------------------------------------------------

use std::collections::HashSet;

use crate::error::RecommendError;
use crate::types::{ScoredRecommendation, Strategy};

/// Default share of the blended score given to content similarity.
pub const DEFAULT_CONTENT_WEIGHT: f64 = 0.5;

/// Default number of candidates requested from each strategy before fusion.
pub const DEFAULT_CANDIDATE_POOL: usize = 5;

/// Validate a content weight, which must be a finite value in [0, 1].
pub fn validate_weight(content_weight: f64) -> Result<f64, RecommendError> {
	if content_weight.is_finite() && (0.0..=1.0).contains(&content_weight) {
		Ok(content_weight)
	} else {
		Err(RecommendError::InvalidWeight(content_weight))
	}
}

/// Min-max normalize into [0, 1]. With fewer than two scores, or when every
/// score is equal, the range is undefined and all outputs are 0.0.
pub fn min_max_normalize(scores: &[f64]) -> Vec<f64> {
	let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
	let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
	let range = max - min;
	if scores.len() <= 1 || !range.is_finite() || range == 0.0 {
		return vec![0.0; scores.len()];
	}
	scores.iter().map(|s| (s - min) / range).collect()
}

/// Weight applied to candidates from `source`.
pub fn strategy_weight(source: Strategy, content_weight: f64) -> f64 {
	match source {
		Strategy::Content => content_weight,
		Strategy::Collaborative => 1.0 - content_weight,
	}
}

fn annotate(mut recs: Vec<ScoredRecommendation>, weight: f64) -> Vec<ScoredRecommendation> {
	let raw: Vec<f64> = recs.iter().map(|r| r.score).collect();
	for (rec, norm) in recs.iter_mut().zip(min_max_normalize(&raw)) {
		rec.normalized_score = Some(norm);
		rec.weighted_score = Some(norm * weight);
	}
	recs
}

/// Fuse two strategy lists into a top-`k` blended ranking.
///
/// Ordering: weighted score descending, then content before collaborative,
/// then each strategy's own order. A title present more than once (the same
/// book, or another edition under a different id) appears once, as its
/// higher-ranked occurrence. At a weight of exactly 0 or 1 the
/// zero-weighted strategy is left out, so the result is the other strategy's
/// ranking unchanged.
pub fn fuse(
	content: Vec<ScoredRecommendation>,
	collaborative: Vec<ScoredRecommendation>,
	content_weight: f64,
	k: usize,
) -> Result<Vec<ScoredRecommendation>, RecommendError> {
	let content_weight = validate_weight(content_weight)?;

	let content = annotate(content, strategy_weight(Strategy::Content, content_weight));
	let collaborative = annotate(
		collaborative,
		strategy_weight(Strategy::Collaborative, content_weight),
	);
	// A strategy weighted at zero contributes no candidates.
	let content = if content_weight == 0.0 { Vec::new() } else { content };
	let collaborative = if content_weight == 1.0 { Vec::new() } else { collaborative };

	let mut pool: Vec<(usize, ScoredRecommendation)> = content
		.into_iter()
		.enumerate()
		.chain(collaborative.into_iter().enumerate())
		.collect();

	pool.sort_by(|(ia, a), (ib, b)| {
		let wa = a.weighted_score.unwrap_or(0.0);
		let wb = b.weighted_score.unwrap_or(0.0);
		wb.partial_cmp(&wa)
			.unwrap_or(std::cmp::Ordering::Equal)
			.then(a.source.cmp(&b.source))
			.then(ia.cmp(ib))
	});

	let mut seen: HashSet<String> = HashSet::new();
	Ok(pool
		.into_iter()
		.map(|(_, rec)| rec)
		.filter(|rec| seen.insert(rec.title.clone()))
		.take(k)
		.collect())
}
