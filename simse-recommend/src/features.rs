// ---------------------------------------------------------------------------
// Feature extraction — TF-IDF over concatenated book text fields
// ---------------------------------------------------------------------------
//
// Deterministic for identical input: vocabulary columns are assigned in
// lexical order, idf uses the smoothed form ln((1 + n) / (1 + df)) + 1, and
// every row is L2-normalized. Missing text fields read as "".
// ---------------------------------------------------------------------------

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::types::{Book, FeatureMatrix, SparseVector};

/// Text fields concatenated when no explicit list is given.
pub const DEFAULT_TEXT_FIELDS: [&str; 3] = ["title", "authors", "description"];

const STOP_WORDS: &[&str] = &[
	"a", "about", "above", "across", "after", "afterwards", "again", "against", "all",
	"almost", "alone", "along", "already", "also", "although", "always", "am", "among",
	"amongst", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway",
	"anywhere", "are", "around", "as", "at", "back", "be", "became", "because", "become",
	"becomes", "becoming", "been", "before", "beforehand", "behind", "being", "below",
	"beside", "besides", "between", "beyond", "both", "but", "by", "can", "cannot", "could",
	"did", "do", "does", "done", "down", "during", "each", "eg", "either", "else",
	"elsewhere", "enough", "etc", "even", "ever", "every", "everyone", "everything",
	"everywhere", "except", "few", "for", "former", "formerly", "from", "further", "had",
	"has", "have", "he", "hence", "her", "here", "hereafter", "hereby", "herein", "hers",
	"herself", "him", "himself", "his", "how", "however", "ie", "if", "in", "indeed",
	"into", "is", "it", "its", "itself", "just", "last", "latter", "latterly", "least",
	"less", "ltd", "many", "may", "me", "meanwhile", "might", "more", "moreover", "most",
	"mostly", "much", "must", "my", "myself", "namely", "neither", "never", "nevertheless",
	"next", "no", "nobody", "none", "noone", "nor", "not", "nothing", "now", "nowhere",
	"of", "off", "often", "on", "once", "one", "only", "onto", "or", "other", "others",
	"otherwise", "our", "ours", "ourselves", "out", "over", "own", "per", "perhaps",
	"please", "rather", "re", "same", "seem", "seemed", "seeming", "seems", "several",
	"she", "should", "since", "so", "some", "somehow", "someone", "something", "sometime",
	"sometimes", "somewhere", "still", "such", "than", "that", "the", "their", "them",
	"themselves", "then", "thence", "there", "thereafter", "thereby", "therefore",
	"therein", "thereupon", "these", "they", "this", "those", "though", "through",
	"throughout", "thru", "thus", "to", "together", "too", "toward", "towards", "under",
	"until", "up", "upon", "us", "very", "via", "was", "we", "well", "were", "what",
	"whatever", "when", "whence", "whenever", "where", "whereafter", "whereas", "whereby",
	"wherein", "whereupon", "wherever", "whether", "which", "while", "whither", "who",
	"whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without",
	"would", "yet", "you", "your", "yours", "yourself", "yourselves",
];

// ---------------------------------------------------------------------------
// Tokenization
// ---------------------------------------------------------------------------

fn token_pattern() -> Option<&'static Regex> {
	static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
	PATTERN.get_or_init(|| Regex::new(r"\b\w\w+\b").ok()).as_ref()
}

/// Lowercase and pull out runs of two or more word characters (letters,
/// digits, underscore), dropping English stop words.
pub fn tokenize(text: &str) -> Vec<String> {
	let Some(pattern) = token_pattern() else {
		return Vec::new();
	};
	let lowered = text.to_lowercase();
	pattern
		.find_iter(&lowered)
		.map(|m| m.as_str())
		.filter(|t| !STOP_WORDS.contains(t))
		.map(str::to_string)
		.collect()
}

/// Join the named text fields of a book with single spaces.
pub fn combine_fields<S: AsRef<str>>(book: &Book, fields: &[S]) -> String {
	fields
		.iter()
		.map(|f| book.text_field(f.as_ref()))
		.collect::<Vec<_>>()
		.join(" ")
}

// ---------------------------------------------------------------------------
// TfidfVectorizer
// ---------------------------------------------------------------------------

/// A fitted TF-IDF vocabulary.
#[derive(Debug, Clone, Default)]
pub struct TfidfVectorizer {
	vocabulary: HashMap<String, usize>,
	idf: Vec<f64>,
}

impl TfidfVectorizer {
	/// Learn the vocabulary and idf weights from a document collection.
	pub fn fit<S: AsRef<str>>(docs: &[S]) -> Self {
		let tokenized: Vec<Vec<String>> = docs.iter().map(|d| tokenize(d.as_ref())).collect();
		Self::fit_tokens(&tokenized)
	}

	fn fit_tokens(tokenized: &[Vec<String>]) -> Self {
		let mut doc_freq: BTreeMap<&str, usize> = BTreeMap::new();
		for tokens in tokenized {
			let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
			for term in unique {
				*doc_freq.entry(term).or_insert(0) += 1;
			}
		}

		let n = tokenized.len() as f64;
		let mut vocabulary = HashMap::with_capacity(doc_freq.len());
		let mut idf = Vec::with_capacity(doc_freq.len());
		for (col, (term, df)) in doc_freq.into_iter().enumerate() {
			vocabulary.insert(term.to_string(), col);
			idf.push(((1.0 + n) / (1.0 + df as f64)).ln() + 1.0);
		}

		Self { vocabulary, idf }
	}

	/// Fit on `docs` and return their feature rows in input order.
	pub fn fit_transform<S: AsRef<str>>(docs: &[S]) -> (Self, FeatureMatrix) {
		let tokenized: Vec<Vec<String>> = docs.iter().map(|d| tokenize(d.as_ref())).collect();
		let vectorizer = Self::fit_tokens(&tokenized);
		let rows = tokenized
			.iter()
			.map(|tokens| vectorizer.weigh(tokens))
			.collect();
		let matrix = FeatureMatrix::new(rows, vectorizer.vocabulary_len());
		(vectorizer, matrix)
	}

	/// Project unseen text onto the fitted vocabulary. Unknown terms are
	/// ignored, so text sharing no vocabulary yields a zero vector.
	pub fn transform(&self, doc: &str) -> SparseVector {
		self.weigh(&tokenize(doc))
	}

	pub fn vocabulary_len(&self) -> usize {
		self.idf.len()
	}

	pub fn column(&self, term: &str) -> Option<usize> {
		self.vocabulary.get(term).copied()
	}

	fn weigh(&self, tokens: &[String]) -> SparseVector {
		let mut counts: HashMap<usize, f64> = HashMap::new();
		for token in tokens {
			if let Some(&col) = self.vocabulary.get(token) {
				*counts.entry(col).or_insert(0.0) += 1.0;
			}
		}
		let weighted: Vec<(usize, f64)> = counts
			.into_iter()
			.map(|(col, tf)| (col, tf * self.idf[col]))
			.collect();
		let norm = weighted.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
		if norm == 0.0 {
			return SparseVector::default();
		}
		SparseVector::new(weighted.into_iter().map(|(c, w)| (c, w / norm)).collect())
	}
}

/// Build the TF-IDF feature matrix for a catalog, one row per book.
pub fn extract_features<S: AsRef<str>>(
	books: &[Book],
	text_fields: &[S],
) -> (TfidfVectorizer, FeatureMatrix) {
	let docs: Vec<String> = books.iter().map(|b| combine_fields(b, text_fields)).collect();
	TfidfVectorizer::fit_transform(&docs)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cosine::sparse_cosine;

	fn book(id: &str, title: &str, authors: &str, description: Option<&str>) -> Book {
		Book {
			book_id: id.into(),
			title: title.into(),
			authors: authors.into(),
			description: description.map(str::to_string),
			rating: None,
			num_ratings: None,
		}
	}

	#[test]
	fn tokenize_drops_stop_words_and_short_tokens() {
		assert_eq!(
			tokenize("The Lord of the Rings: a Fellowship!"),
			vec!["lord", "rings", "fellowship"]
		);
		assert!(tokenize("").is_empty());
	}

	#[test]
	fn tokenize_keeps_underscores_and_digits() {
		assert_eq!(tokenize("sci_fi X-Men 1984"), vec!["sci_fi", "men", "1984"]);
	}

	#[test]
	fn combine_fields_treats_missing_as_empty() {
		let b = book("1", "Dune", "Herbert", None);
		assert_eq!(combine_fields(&b, &["title", "description", "authors"]), "Dune  Herbert");
	}

	#[test]
	fn vocabulary_is_lexically_ordered() {
		let v = TfidfVectorizer::fit(&["zebra apple", "mango"]);
		assert_eq!(v.vocabulary_len(), 3);
		assert_eq!(v.column("apple"), Some(0));
		assert_eq!(v.column("mango"), Some(1));
		assert_eq!(v.column("zebra"), Some(2));
	}

	#[test]
	fn rows_are_unit_length() {
		let (_, m) = TfidfVectorizer::fit_transform(&["space opera empire", "space whales"]);
		for row in m.rows() {
			assert!((row.magnitude() - 1.0).abs() < 1e-10);
		}
	}

	#[test]
	fn rarer_terms_weigh_more() {
		let (v, m) = TfidfVectorizer::fit_transform(&["dragon magic", "dragon war", "dragon sea"]);
		let row = m.row(0).unwrap();
		let weight = |term: &str| {
			let col = v.column(term).unwrap();
			let pos = row.indices().iter().position(|&c| c == col).unwrap();
			row.values()[pos]
		};
		assert!(weight("magic") > weight("dragon"));
	}

	#[test]
	fn extraction_is_deterministic() {
		let books = vec![
			book("1", "Dune", "Frank Herbert", Some("desert planet spice")),
			book("2", "Children of Dune", "Frank Herbert", Some("spice empire")),
		];
		let (_, a) = extract_features(&books, &DEFAULT_TEXT_FIELDS);
		let (_, b) = extract_features(&books, &DEFAULT_TEXT_FIELDS);
		assert_eq!(a.rows(), b.rows());
		assert!(sparse_cosine(a.row(0).unwrap(), a.row(1).unwrap()) > 0.0);
	}

	#[test]
	fn transform_ignores_unknown_terms() {
		let v = TfidfVectorizer::fit(&["dragon magic"]);
		assert_eq!(v.transform("submarine").nnz(), 0);
		assert_eq!(v.transform("magic submarine").nnz(), 1);
	}
}
