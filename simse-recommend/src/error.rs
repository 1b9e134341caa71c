use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecommendError {
	#[error("Engine not fitted: call engine/fit first")]
	NotFitted,
	#[error("Invalid user ID. Please enter a number between 0 and {max}.")]
	InvalidUserId { max: u32 },
	#[error("Invalid content weight {0}: must be within [0, 1]")]
	InvalidWeight(f64),
	#[error("Empty catalog: nothing to fit")]
	EmptyCatalog,
	#[error("Feature matrix has {rows} rows but the catalog has {items} items")]
	DimensionMismatch { rows: usize, items: usize },
	#[error("Invalid params: {0}")]
	InvalidParams(String),
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("CSV error: {0}")]
	Csv(#[from] csv::Error),
}

impl RecommendError {
	pub fn code(&self) -> &str {
		match self {
			Self::NotFitted => "RECOMMEND_NOT_FITTED",
			Self::InvalidUserId { .. } => "RECOMMEND_INVALID_USER",
			Self::InvalidWeight(_) => "RECOMMEND_INVALID_WEIGHT",
			Self::EmptyCatalog => "RECOMMEND_EMPTY_CATALOG",
			Self::DimensionMismatch { .. } => "RECOMMEND_DIMENSION_MISMATCH",
			Self::InvalidParams(_) => "RECOMMEND_INVALID_PARAMS",
			Self::Io(_) => "RECOMMEND_IO",
			Self::Csv(_) => "RECOMMEND_CSV",
		}
	}

	pub fn to_json_rpc_error(&self) -> serde_json::Value {
		serde_json::json!({
			"recommendCode": self.code(),
			"message": self.to_string(),
		})
	}
}
