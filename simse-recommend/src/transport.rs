use std::io::{self, Write};

use serde::Serialize;

/// Either half of a JSON-RPC response; exactly one is ever present.
#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum Outcome {
	Result(serde_json::Value),
	Error {
		code: i32,
		message: String,
		#[serde(skip_serializing_if = "Option::is_none")]
		data: Option<serde_json::Value>,
	},
}

#[derive(Serialize)]
struct Envelope {
	jsonrpc: &'static str,
	id: u64,
	#[serde(flatten)]
	outcome: Outcome,
}

/// Response writer: one JSON-RPC message per stdout line.
#[derive(Default)]
pub struct NdjsonTransport;

impl NdjsonTransport {
	pub fn new() -> Self {
		Self
	}

	pub fn write_response(&self, id: u64, result: serde_json::Value) {
		self.emit(id, Outcome::Result(result));
	}

	pub fn write_error(
		&self,
		id: u64,
		code: i32,
		message: impl Into<String>,
		data: Option<serde_json::Value>,
	) {
		self.emit(
			id,
			Outcome::Error {
				code,
				message: message.into(),
				data,
			},
		);
	}

	fn emit(&self, id: u64, outcome: Outcome) {
		let envelope = Envelope {
			jsonrpc: "2.0",
			id,
			outcome,
		};
		let line = match serde_json::to_string(&envelope) {
			Ok(line) => line,
			Err(e) => {
				tracing::error!(id, "Failed to serialize response: {}", e);
				return;
			}
		};
		let mut stdout = io::stdout().lock();
		if let Err(e) = writeln!(stdout, "{line}").and_then(|_| stdout.flush()) {
			tracing::error!(id, "Failed to write response: {}", e);
		}
	}
}
