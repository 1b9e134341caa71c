// ---------------------------------------------------------------------------
// Catalog — book records, CSV loading, title lookup, synthetic ratings
// ---------------------------------------------------------------------------
//
// The catalog is immutable once built. Book positions are stable and are the
// row indices used by the content model's feature matrix.
// ---------------------------------------------------------------------------

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use regex::RegexBuilder;

use crate::error::RecommendError;
use crate::types::{Book, RatingEvent};

/// Size of the synthetic user population derived from record positions.
pub const DEFAULT_USER_POPULATION: u32 = 100;

/// Synthetic user id for the record at `record_index`.
pub fn synthetic_user(record_index: usize, population: u32) -> u32 {
	(record_index % population.max(1) as usize) as u32
}

/// Ordered, immutable list of books with an id index.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
	books: Vec<Book>,
	positions: HashMap<String, usize>,
}

impl Catalog {
	/// Build a catalog. When a book id repeats, lookups by id resolve to its
	/// first occurrence.
	pub fn new(books: Vec<Book>) -> Self {
		let mut positions = HashMap::with_capacity(books.len());
		for (idx, book) in books.iter().enumerate() {
			positions.entry(book.book_id.clone()).or_insert(idx);
		}
		Self { books, positions }
	}

	/// Load a CSV file with a header row. Recognized columns are `bookId`,
	/// `title`, `author`, `description`, `rating` and `numRatings` (snake_case
	/// variants also accepted); extra columns are ignored.
	pub fn load_csv(path: impl AsRef<Path>, sample_size: Option<usize>) -> Result<Self, RecommendError> {
		let file = std::fs::File::open(path.as_ref())?;
		Self::from_csv_reader(file, sample_size)
	}

	/// Read CSV records from any reader, keeping at most `sample_size` rows.
	/// Rows that fail to parse are skipped with a warning.
	pub fn from_csv_reader<R: Read>(reader: R, sample_size: Option<usize>) -> Result<Self, RecommendError> {
		let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
		let limit = sample_size.unwrap_or(usize::MAX);
		let mut books = Vec::new();
		let mut skipped = 0usize;

		for (row, record) in rdr.deserialize::<Book>().take(limit).enumerate() {
			match record {
				Ok(mut book) => {
					if book.rating.is_some_and(|r| !r.is_finite()) {
						tracing::warn!(row, book_id = %book.book_id, "Ignoring non-finite rating");
						book.rating = None;
					}
					books.push(book);
				}
				Err(e) if e.is_io_error() => return Err(e.into()),
				Err(e) => {
					skipped += 1;
					tracing::warn!(row, error = %e, "Skipping malformed catalog row");
				}
			}
		}

		tracing::debug!(books = books.len(), skipped, "Catalog loaded");
		Ok(Self::new(books))
	}

	pub fn books(&self) -> &[Book] {
		&self.books
	}

	pub fn len(&self) -> usize {
		self.books.len()
	}

	pub fn is_empty(&self) -> bool {
		self.books.is_empty()
	}

	pub fn get(&self, idx: usize) -> Option<&Book> {
		self.books.get(idx)
	}

	/// Catalog position of a book id.
	pub fn position(&self, book_id: &str) -> Option<usize> {
		self.positions.get(book_id).copied()
	}

	pub fn get_by_id(&self, book_id: &str) -> Option<&Book> {
		self.position(book_id).and_then(|idx| self.books.get(idx))
	}

	/// First book whose title contains `query`, ignoring case.
	/// A blank query matches nothing.
	pub fn find_by_title(&self, query: &str) -> Option<&Book> {
		let query = query.trim();
		if query.is_empty() {
			return None;
		}
		let pattern = RegexBuilder::new(&regex::escape(query))
			.case_insensitive(true)
			.build()
			.ok()?;
		self.books.iter().find(|b| pattern.is_match(&b.title))
	}

	/// Highest-rated books with at least `min_ratings` ratings. Unrated books
	/// are skipped; equal ratings keep catalog order.
	pub fn top_rated(&self, limit: usize, min_ratings: u64) -> Vec<&Book> {
		let mut rated: Vec<(&Book, f64)> = self
			.books
			.iter()
			.filter(|b| b.num_ratings.unwrap_or(0) >= min_ratings)
			.filter_map(|b| b.rating.map(|r| (b, r)))
			.collect();
		rated.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
		rated.into_iter().take(limit).map(|(b, _)| b).collect()
	}

	/// One rating event per rated record, attributed to the synthetic user
	/// `record_index mod population`.
	pub fn synthetic_ratings(&self, population: u32) -> Vec<RatingEvent> {
		self.books
			.iter()
			.enumerate()
			.filter_map(|(idx, book)| {
				book.rating.filter(|r| r.is_finite()).map(|rating| RatingEvent {
					user_id: synthetic_user(idx, population),
					book_id: book.book_id.clone(),
					rating,
				})
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const CSV: &str = "\
bookId,title,series,author,rating,description,numRatings
1.The_Hunger_Games,The Hunger Games,HG #1,Suzanne Collins,4.33,Winning will make you famous,6376780
2.Harry_Potter,Harry Potter and the Order of the Phoenix,HP #5,J.K. Rowling,4.5,There is a door,2507623
3.Mockingbird,To Kill a Mockingbird,,Harper Lee,4.28,,4501075
4.Unrated,Draft Notes,,Anon,,,
";

	fn catalog() -> Catalog {
		Catalog::from_csv_reader(CSV.as_bytes(), None).unwrap()
	}

	#[test]
	fn loads_and_renames_columns() {
		let c = catalog();
		assert_eq!(c.len(), 4);
		let hp = c.get(1).unwrap();
		assert_eq!(hp.authors, "J.K. Rowling");
		assert_eq!(hp.num_ratings, Some(2507623));
		assert_eq!(c.get(2).unwrap().description, None);
		assert_eq!(c.get(3).unwrap().rating, None);
	}

	#[test]
	fn sample_size_keeps_leading_rows() {
		let c = Catalog::from_csv_reader(CSV.as_bytes(), Some(2)).unwrap();
		assert_eq!(c.len(), 2);
		assert_eq!(c.get(1).unwrap().book_id, "2.Harry_Potter");
	}

	#[test]
	fn load_csv_from_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("books.csv");
		std::fs::write(&path, CSV).unwrap();
		assert_eq!(Catalog::load_csv(&path, None).unwrap().len(), 4);
	}

	#[test]
	fn non_finite_ratings_read_as_unrated() {
		let csv = "bookId,title,author,rating\na,Alpha,X,4.0\nb,Beta,Y,nan\nc,Gamma,Z,inf\n";
		let c = Catalog::from_csv_reader(csv.as_bytes(), None).unwrap();
		assert_eq!(c.len(), 3);
		assert_eq!(c.get(1).unwrap().rating, None);
		assert_eq!(c.get(2).unwrap().rating, None);
		let events = c.synthetic_ratings(2);
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].book_id, "a");

		let inline = Catalog::new(vec![Book {
			book_id: "n".into(),
			title: "NaN".into(),
			authors: String::new(),
			description: None,
			rating: Some(f64::NAN),
			num_ratings: None,
		}]);
		assert!(inline.synthetic_ratings(2).is_empty());
	}

	#[test]
	fn missing_file_is_io_error() {
		let err = Catalog::load_csv("/definitely/not/here.csv", None).unwrap_err();
		assert!(matches!(err, RecommendError::Io(_)));
	}

	#[test]
	fn title_lookup_is_case_insensitive_first_match() {
		let c = catalog();
		assert_eq!(c.find_by_title("harry").unwrap().book_id, "2.Harry_Potter");
		// "the" occurs in several titles; the first one wins.
		assert_eq!(c.find_by_title("THE").unwrap().book_id, "1.The_Hunger_Games");
		assert!(c.find_by_title("no such book").is_none());
		assert!(c.find_by_title("   ").is_none());
	}

	#[test]
	fn title_lookup_treats_query_literally() {
		let c = Catalog::new(vec![Book {
			book_id: "x".into(),
			title: "C++ (Second Edition)".into(),
			authors: String::new(),
			description: None,
			rating: None,
			num_ratings: None,
		}]);
		assert!(c.find_by_title("c++ (second").is_some());
	}

	#[test]
	fn top_rated_filters_and_orders() {
		let c = catalog();
		let top: Vec<&str> = c
			.top_rated(10, 3_000_000)
			.iter()
			.map(|b| b.book_id.as_str())
			.collect();
		assert_eq!(top, vec!["1.The_Hunger_Games", "3.Mockingbird"]);
		assert_eq!(c.top_rated(1, 0)[0].book_id, "2.Harry_Potter");
	}

	#[test]
	fn synthetic_users_wrap_by_population() {
		assert_eq!(synthetic_user(0, 100), 0);
		assert_eq!(synthetic_user(205, 100), 5);
		let events = catalog().synthetic_ratings(2);
		// Unrated record is skipped.
		assert_eq!(events.len(), 3);
		assert_eq!(events[2].user_id, 0);
		assert_eq!(events[1].user_id, 1);
	}

	#[test]
	fn duplicate_ids_resolve_to_first() {
		let b = |title: &str| Book {
			book_id: "dup".into(),
			title: title.into(),
			authors: String::new(),
			description: None,
			rating: None,
			num_ratings: None,
		};
		let c = Catalog::new(vec![b("first"), b("second")]);
		assert_eq!(c.get_by_id("dup").unwrap().title, "first");
	}
}
