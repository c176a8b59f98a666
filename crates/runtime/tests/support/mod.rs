//! Scripted in-memory `RemoteSessionClient` with call counters.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use amdp_protocol::{Breakpoint, SessionStatus, StatusReport, StepKind, StepOutcome, Variable};
use amdp_runtime::{
	AntiReplayToken, Credentials, Error, RemoteSession, RemoteSessionClient, Result, SessionAffinity, SessionConfig,
	SessionManager,
};
use async_trait::async_trait;
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct Calls {
	pub fetch_token: AtomicUsize,
	pub start_session: AtomicUsize,
	pub step: AtomicUsize,
	pub get_status: AtomicUsize,
	pub get_variables: AtomicUsize,
	pub get_breakpoints: AtomicUsize,
	pub set_breakpoint: AtomicUsize,
	pub stop_session: AtomicUsize,
	pub hard_stop: AtomicUsize,
	pub keepalive: AtomicUsize,
}

impl Calls {
	/// Calls that touch an existing session (everything but token and start).
	pub fn session_calls(&self) -> usize {
		[
			&self.step,
			&self.get_status,
			&self.get_variables,
			&self.get_breakpoints,
			&self.set_breakpoint,
			&self.stop_session,
			&self.hard_stop,
			&self.keepalive,
		]
		.iter()
		.map(|c| c.load(Ordering::SeqCst))
		.sum()
	}

	pub fn total(&self) -> usize {
		self.session_calls() + self.fetch_token.load(Ordering::SeqCst) + self.start_session.load(Ordering::SeqCst)
	}
}

#[derive(Debug, Default)]
pub struct FakeClient {
	pub calls: Calls,
	pub fail_token: AtomicBool,
	pub fail_start: AtomicBool,
	pub fail_variables: AtomicBool,
	pub fail_stop: AtomicBool,
	pub fail_keepalive: AtomicBool,
	pub panic_on_step: AtomicBool,
	pub step_delay: Mutex<Duration>,
	/// Main ids each call was issued against, in call order.
	pub journal: Mutex<Vec<(&'static str, String)>>,
	sessions: AtomicUsize,
	breakpoints: Mutex<Vec<Breakpoint>>,
}

impl FakeClient {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn count(counter: &AtomicUsize) -> usize {
		counter.load(Ordering::SeqCst)
	}

	pub fn set_step_delay(&self, delay: Duration) {
		*self.step_delay.lock() = delay;
	}

	pub fn journal(&self) -> Vec<(&'static str, String)> {
		self.journal.lock().clone()
	}

	fn record(&self, counter: &AtomicUsize, op: &'static str, session: &SessionAffinity) {
		counter.fetch_add(1, Ordering::SeqCst);
		self.journal.lock().push((op, session.main_id.clone()));
	}
}

#[async_trait]
impl RemoteSessionClient for FakeClient {
	async fn fetch_token(&self, _credentials: &Credentials) -> Result<AntiReplayToken> {
		self.calls.fetch_token.fetch_add(1, Ordering::SeqCst);
		if self.fail_token.load(Ordering::SeqCst) {
			return Err(Error::AuthFailure {
				status: Some(401),
				message: "unauthorized".to_string(),
			});
		}
		Ok(AntiReplayToken::new("token-1"))
	}

	async fn start_session(
		&self,
		token: &AntiReplayToken,
		_object_uri: &str,
		_credentials: &Credentials,
	) -> Result<RemoteSession> {
		self.calls.start_session.fetch_add(1, Ordering::SeqCst);
		assert_eq!(token.as_str(), "token-1");
		if self.fail_start.load(Ordering::SeqCst) {
			return Err(Error::RemoteOperation {
				operation: "start session",
				status: Some(500),
				body: "object not debuggable".to_string(),
			});
		}
		let n = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
		Ok(RemoteSession {
			session_id: format!("S-{n}"),
			main_id: format!("MAIN-{n}"),
		})
	}

	async fn step(&self, session: &SessionAffinity, kind: StepKind) -> Result<StepOutcome> {
		self.record(&self.calls.step, "step", session);
		if self.panic_on_step.load(Ordering::SeqCst) {
			panic!("step handler blew up");
		}
		let delay = *self.step_delay.lock();
		if !delay.is_zero() {
			tokio::time::sleep(delay).await;
		}
		let line = Self::count(&self.calls.step) as u32 + 10;
		Ok(StepOutcome {
			status: Some(SessionStatus::AtBreakpoint),
			line: Some(line),
			procedure: Some(format!("CALC_{}", kind.as_str())),
			raw: String::new(),
		})
	}

	async fn get_status(&self, session: &SessionAffinity) -> Result<StatusReport> {
		self.record(&self.calls.get_status, "get_status", session);
		Ok(StatusReport {
			status: Some(SessionStatus::Running),
			..Default::default()
		})
	}

	async fn get_variables(&self, session: &SessionAffinity) -> Result<Vec<Variable>> {
		self.record(&self.calls.get_variables, "get_variables", session);
		if self.fail_variables.load(Ordering::SeqCst) {
			return Err(Error::RemoteOperation {
				operation: "get variables",
				status: Some(500),
				body: "debuggee not suspended".to_string(),
			});
		}
		Ok(vec![Variable {
			name: "LV_COUNT".to_string(),
			type_name: Some("INTEGER".to_string()),
			value: "3".to_string(),
		}])
	}

	async fn get_breakpoints(&self, session: &SessionAffinity) -> Result<Vec<Breakpoint>> {
		self.record(&self.calls.get_breakpoints, "get_breakpoints", session);
		Ok(self.breakpoints.lock().clone())
	}

	async fn set_breakpoint(&self, session: &SessionAffinity, procedure: &str, line: u32) -> Result<()> {
		self.record(&self.calls.set_breakpoint, "set_breakpoint", session);
		self.breakpoints.lock().push(Breakpoint {
			procedure: procedure.to_string(),
			line,
			id: None,
		});
		Ok(())
	}

	async fn stop_session(&self, session: &SessionAffinity) -> Result<()> {
		self.record(&self.calls.stop_session, "stop_session", session);
		if self.fail_stop.load(Ordering::SeqCst) {
			return Err(Error::RemoteOperation {
				operation: "stop session",
				status: Some(503),
				body: "service unavailable".to_string(),
			});
		}
		Ok(())
	}

	async fn hard_stop(&self, session: &SessionAffinity) {
		self.record(&self.calls.hard_stop, "hard_stop", session);
	}

	async fn keepalive(&self, session: &SessionAffinity) -> Result<()> {
		self.record(&self.calls.keepalive, "keepalive", session);
		if self.fail_keepalive.load(Ordering::SeqCst) {
			return Err(Error::Transport("connection reset by peer".to_string()));
		}
		Ok(())
	}
}

pub fn credentials() -> Credentials {
	Credentials::new("DEVELOPER", "secret")
}

/// Keepalive far enough out that it never fires unless a test wants it.
pub fn quiet_config() -> SessionConfig {
	SessionConfig::default().with_keepalive_interval(Duration::from_secs(3600))
}

pub fn manager(client: &Arc<FakeClient>, config: SessionConfig) -> SessionManager {
	SessionManager::new(client.clone(), config)
}

/// Polls until the worker's cleanup has cleared the running flag.
pub async fn wait_stopped(manager: &SessionManager) {
	for _ in 0..1000 {
		if !manager.is_running() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	panic!("session still running");
}
