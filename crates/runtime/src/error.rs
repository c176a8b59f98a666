//! Error types for the session runtime.

use std::time::Duration;

use amdp_protocol::ResponseError;
use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the session manager, its worker and the remote client.
///
/// Only [`Error::FaultTerminated`] ends a session. Everything else is scoped
/// to the call that produced it.
#[derive(Debug, Clone, Error)]
pub enum Error {
	/// `start` was called while a session is active.
	#[error("AMDP session already active")]
	AlreadyRunning,

	/// No active session to receive the command.
	#[error("AMDP session not running")]
	NotRunning,

	/// Anti-replay token could not be acquired.
	#[error("authentication failed{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
	AuthFailure { status: Option<u16>, message: String },

	/// A remote call completed with a failure status.
	#[error("{operation} failed: {}{body}", status.map(|s| format!("{s} - ")).unwrap_or_default())]
	RemoteOperation {
		operation: &'static str,
		status: Option<u16>,
		body: String,
	},

	/// The worker did not accept the command within the enqueue bound.
	#[error("command queue timeout after {}ms", .0.as_millis())]
	QueueTimeout(Duration),

	/// The worker did not answer within the response bound.
	#[error("command response timeout after {}ms", .0.as_millis())]
	ResponseTimeout(Duration),

	/// An internal fault forced session teardown.
	#[error("session terminated by internal fault: {0}")]
	FaultTerminated(String),

	/// Command arguments could not be interpreted.
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	/// The request never produced a response (connect, TLS, body read).
	#[error("transport error: {0}")]
	Transport(String),
}

impl Error {
	/// Stable snake_case code used in structured replies.
	pub fn code(&self) -> &'static str {
		match self {
			Error::AlreadyRunning => "already_running",
			Error::NotRunning => "not_running",
			Error::AuthFailure { .. } => "auth_failure",
			Error::RemoteOperation { .. } => "remote_operation_failure",
			Error::QueueTimeout(_) => "queue_timeout",
			Error::ResponseTimeout(_) => "response_timeout",
			Error::FaultTerminated(_) => "fault_terminated",
			Error::InvalidArgument(_) => "invalid_argument",
			Error::Transport(_) => "transport_error",
		}
	}

	/// Remote status code, if the failure came from a remote response.
	pub fn status(&self) -> Option<u16> {
		match self {
			Error::AuthFailure { status, .. } | Error::RemoteOperation { status, .. } => *status,
			_ => None,
		}
	}

	/// Returns true for the manager's own bounded-wait failures.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::QueueTimeout(_) | Error::ResponseTimeout(_))
	}

	/// Returns true if this error ended the whole session.
	pub fn is_fatal(&self) -> bool {
		matches!(self, Error::FaultTerminated(_))
	}

	pub fn to_response_error(&self) -> ResponseError {
		ResponseError {
			code: self.code().to_string(),
			message: self.to_string(),
			status: self.status(),
		}
	}
}

impl From<amdp_protocol::ParseError> for Error {
	fn from(err: amdp_protocol::ParseError) -> Self {
		Error::InvalidArgument(err.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn remote_failure_message_carries_status_and_body() {
		let err = Error::RemoteOperation {
			operation: "step",
			status: Some(500),
			body: "boom".to_string(),
		};
		assert_eq!(err.to_string(), "step failed: 500 - boom");
		assert_eq!(err.status(), Some(500));

		let projected = err.to_response_error();
		assert_eq!(projected.code, "remote_operation_failure");
		assert_eq!(projected.status, Some(500));
	}

	#[test]
	fn only_faults_are_fatal() {
		assert!(Error::FaultTerminated("panic".into()).is_fatal());
		assert!(!Error::NotRunning.is_fatal());
		assert!(Error::QueueTimeout(Duration::from_secs(5)).is_timeout());
		assert!(!Error::AlreadyRunning.is_timeout());
	}

	#[test]
	fn auth_failure_without_status() {
		let err = Error::AuthFailure {
			status: None,
			message: "token missing".into(),
		};
		assert_eq!(err.to_string(), "authentication failed: token missing");
	}
}
