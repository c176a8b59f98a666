//! Session state as observed from outside the session worker.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a debug session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
	/// No session exists.
	#[default]
	Idle,
	/// Token fetch or remote session creation is in progress.
	Starting,
	/// Session is live and the debuggee is executing.
	Running,
	/// Debuggee is suspended at a breakpoint.
	AtBreakpoint,
	/// A stop has been issued and the session is winding down.
	Stopping,
}

impl SessionStatus {
	/// Maps the remote status vocabulary onto [`SessionStatus`].
	///
	/// Unknown values return `None` so callers keep their current status.
	pub fn from_remote(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"running" | "attached" | "active" => Some(Self::Running),
			"breakpoint" | "suspended" | "stopped_at_breakpoint" | "debuggee_stopped" => {
				Some(Self::AtBreakpoint)
			}
			"stopping" | "terminating" => Some(Self::Stopping),
			"stopped" | "terminated" | "ended" => Some(Self::Idle),
			"starting" => Some(Self::Starting),
			_ => None,
		}
	}

	/// True for statuses in which a correlation id must be held.
	pub fn is_active(self) -> bool {
		matches!(self, Self::Running | Self::AtBreakpoint | Self::Stopping)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::Starting => "starting",
			Self::Running => "running",
			Self::AtBreakpoint => "at_breakpoint",
			Self::Stopping => "stopping",
		}
	}
}

impl std::fmt::Display for SessionStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Snapshot of a debug session.
///
/// `main_id` is non-empty exactly when [`SessionStatus::is_active`] holds.
/// The default value is the empty state used before start and after cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
	/// Remote-issued session identifier.
	#[serde(default)]
	pub session_id: String,
	/// Correlation id required on every call after session creation.
	#[serde(default)]
	pub main_id: String,
	/// URI of the debuggable artifact.
	#[serde(default)]
	pub object_uri: String,
	#[serde(default)]
	pub status: SessionStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub current_line: Option<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub current_procedure: Option<String>,
}

impl SessionState {
	/// State recorded while `Start` is talking to the remote system.
	pub fn starting(object_uri: impl Into<String>) -> Self {
		Self {
			object_uri: object_uri.into(),
			status: SessionStatus::Starting,
			..Default::default()
		}
	}

	pub fn is_empty(&self) -> bool {
		*self == Self::default()
	}

	/// Clears the breakpoint position fields.
	pub fn clear_position(&mut self) {
		self.current_line = None;
		self.current_procedure = None;
	}
}
