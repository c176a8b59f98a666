//! Command replies and the typed results of remote operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::SessionStatus;

/// Structured failure attached to an unsuccessful [`Response`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
	/// Stable snake_case error code (e.g. `remote_operation_failure`).
	pub code: String,
	pub message: String,
	/// HTTP status reported by the remote system, when there was one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<u16>,
}

/// Reply to a single command.
///
/// The shape of `data` depends on the command kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
	pub success: bool,
	#[serde(default, skip_serializing_if = "Value::is_null")]
	pub data: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<ResponseError>,
}

impl Response {
	pub fn ok(data: impl Into<Value>) -> Self {
		Self {
			success: true,
			data: data.into(),
			error: None,
		}
	}

	pub fn failure(error: ResponseError) -> Self {
		Self {
			success: false,
			data: Value::Null,
			error: Some(error),
		}
	}

	/// Error code of a failed response.
	pub fn error_code(&self) -> Option<&str> {
		self.error.as_ref().map(|e| e.code.as_str())
	}
}

/// Result of a step operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
	/// Status reported after the step, when the remote system included one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<SessionStatus>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub line: Option<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub procedure: Option<String>,
	/// Unparsed response body, kept for diagnostics.
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub raw: String,
}

/// Result of a status query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<SessionStatus>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub line: Option<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub procedure: Option<String>,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub raw: String,
}

/// A variable visible in the suspended debuggee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub type_name: Option<String>,
	#[serde(default)]
	pub value: String,
}

/// A breakpoint registered in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakpoint {
	pub procedure: String,
	pub line: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
}
