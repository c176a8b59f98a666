//! Contract between the session worker and the remote debug endpoint.
//!
//! Every call is a single request/response bounded in time by the
//! implementation. The worker never issues two calls concurrently against the
//! same session, so implementations need no per-session locking.

use std::fmt;

use amdp_protocol::{Breakpoint, StatusReport, StepKind, StepOutcome, Variable};
use async_trait::async_trait;

use crate::config::Credentials;
use crate::error::Result;

/// Short-lived credential required on state-mutating remote calls.
#[derive(Clone, PartialEq, Eq)]
pub struct AntiReplayToken(String);

impl AntiReplayToken {
	pub fn new(token: impl Into<String>) -> Self {
		Self(token.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for AntiReplayToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("AntiReplayToken(..)")
	}
}

/// Identifiers issued by the remote system on session creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSession {
	pub session_id: String,
	pub main_id: String,
}

/// Everything a call needs to reach the right remote session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAffinity {
	pub token: AntiReplayToken,
	pub main_id: String,
}

/// Operations against the remote debug endpoint.
#[async_trait]
pub trait RemoteSessionClient: Send + Sync {
	/// Fetches an anti-replay token. Failures are [`Error::AuthFailure`](crate::Error::AuthFailure).
	async fn fetch_token(&self, credentials: &Credentials) -> Result<AntiReplayToken>;

	/// Creates a remote debug session for `object_uri`.
	async fn start_session(
		&self,
		token: &AntiReplayToken,
		object_uri: &str,
		credentials: &Credentials,
	) -> Result<RemoteSession>;

	async fn step(&self, session: &SessionAffinity, kind: StepKind) -> Result<StepOutcome>;

	async fn get_status(&self, session: &SessionAffinity) -> Result<StatusReport>;

	async fn get_variables(&self, session: &SessionAffinity) -> Result<Vec<Variable>>;

	async fn get_breakpoints(&self, session: &SessionAffinity) -> Result<Vec<Breakpoint>>;

	async fn set_breakpoint(&self, session: &SessionAffinity, procedure: &str, line: u32) -> Result<()>;

	/// Gracefully ends the remote session.
	async fn stop_session(&self, session: &SessionAffinity) -> Result<()>;

	/// Forcefully ends the remote session. Advisory; never fails.
	async fn hard_stop(&self, session: &SessionAffinity);

	/// Keeps the remote session from expiring. Best effort.
	async fn keepalive(&self, session: &SessionAffinity) -> Result<()>;
}
