//! Public facade over one persistent AMDP debug session.
//!
//! [`SessionManager`] is what request handlers hold. It owns the command
//! queue and the worker's lifecycle; the only state it touches directly is
//! the small [`Shared`] record behind a mutex (running flag, public snapshot,
//! queue sender, cancellation token). Everything else belongs to the worker.

use std::sync::Arc;

use amdp_protocol::{CommandArgs, CommandKind, Response, SessionState, SessionStatus, StepKind};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{RemoteSessionClient, SessionAffinity};
use crate::config::{ClientConfig, Credentials, SessionConfig};
use crate::error::{Error, Result};
use crate::http::HttpSessionClient;
use crate::queue::{Command, CommandSender, command_queue, reject_pending};
use crate::worker::{SessionWorker, WorkerExit};

/// State readable outside the worker. Written only by `start` and cleanup.
#[derive(Debug, Default)]
pub(crate) struct Shared {
	pub(crate) running: bool,
	pub(crate) state: SessionState,
	pub(crate) queue: Option<CommandSender>,
	pub(crate) cancel: Option<CancellationToken>,
	pub(crate) worker: Option<JoinHandle<WorkerExit>>,
	pub(crate) last_exit: Option<WorkerExit>,
}

impl Shared {
	/// Returns the record to its idle value. Dropping the queue sender makes
	/// later `send_command` calls observe `NotRunning` immediately.
	pub(crate) fn reset(&mut self, exit: Option<WorkerExit>) {
		self.running = false;
		self.state = SessionState::default();
		self.queue = None;
		self.cancel = None;
		self.last_exit = exit;
	}
}

pub(crate) type SharedState = Arc<Mutex<Shared>>;

/// Unwinds a half-finished `start` if its future is dropped before the
/// worker takes over.
///
/// Only local state is reset. A start dropped while `start_session` is in
/// flight never sees the mainID, so a remote session the server did create
/// is left to expire on its own.
struct StartGuard {
	shared: SharedState,
	armed: bool,
}

impl Drop for StartGuard {
	fn drop(&mut self) {
		if self.armed {
			debug!(target = "amdp.session", "start abandoned; clearing running flag");
			self.shared.lock().reset(None);
		}
	}
}

/// Single logical owner of a remote debug session, safe to share between
/// concurrent callers.
pub struct SessionManager {
	client: Arc<dyn RemoteSessionClient>,
	config: SessionConfig,
	shared: SharedState,
}

impl SessionManager {
	pub fn new(client: Arc<dyn RemoteSessionClient>, config: SessionConfig) -> Self {
		Self {
			client,
			config,
			shared: Arc::new(Mutex::new(Shared::default())),
		}
	}

	/// Manager backed by the HTTP remote client.
	pub fn http(client: ClientConfig, config: SessionConfig) -> Result<Self> {
		let client = HttpSessionClient::new(client)?;
		Ok(Self::new(Arc::new(client), config))
	}

	/// Starts a session with its own cancellation scope.
	pub async fn start(&self, object_uri: &str, credentials: &Credentials) -> Result<()> {
		self.start_with_cancel(object_uri, credentials, &CancellationToken::new())
			.await
	}

	/// Starts a session that also ends when `parent` is cancelled.
	///
	/// Token fetch and remote session creation happen on the caller's task.
	/// The worker is spawned only once both have succeeded.
	pub async fn start_with_cancel(
		&self,
		object_uri: &str,
		credentials: &Credentials,
		parent: &CancellationToken,
	) -> Result<()> {
		let cancel = parent.child_token();
		let mut commands = {
			let mut shared = self.shared.lock();
			if shared.running {
				return Err(Error::AlreadyRunning);
			}
			let (tx, rx) = command_queue(self.config.queue_capacity);
			shared.running = true;
			shared.state = SessionState::starting(object_uri);
			shared.queue = Some(tx);
			shared.cancel = Some(cancel.clone());
			shared.last_exit = None;
			rx
		};
		let mut guard = StartGuard {
			shared: Arc::clone(&self.shared),
			armed: true,
		};

		info!(target = "amdp.session", object_uri, user = %credentials.user, "starting AMDP session");

		let opened = self.open_remote(object_uri, credentials).await;
		let (affinity, session_id) = match opened {
			Ok(opened) => opened,
			Err(err) => {
				warn!(target = "amdp.session", error = %err, "session start failed");
				reject_pending(&mut commands, &Error::NotRunning);
				guard.armed = false;
				self.shared.lock().reset(None);
				return Err(err);
			}
		};

		let state = SessionState {
			session_id,
			main_id: affinity.main_id.clone(),
			object_uri: object_uri.to_string(),
			status: SessionStatus::Running,
			current_line: None,
			current_procedure: None,
		};

		let worker = SessionWorker::new(
			Arc::clone(&self.client),
			Arc::clone(&self.shared),
			state.clone(),
			affinity,
			commands,
			cancel,
			self.config.keepalive_interval,
		);

		info!(
			target = "amdp.session",
			session_id = %state.session_id,
			main_id = %state.main_id,
			"AMDP session running"
		);

		// Held across the spawn so the worker cannot publish or reset first.
		let mut shared = self.shared.lock();
		shared.state = state;
		shared.worker = Some(tokio::spawn(worker.run()));
		guard.armed = false;
		Ok(())
	}

	async fn open_remote(&self, object_uri: &str, credentials: &Credentials) -> Result<(SessionAffinity, String)> {
		let token = self
			.client
			.fetch_token(credentials)
			.await
			.map_err(|err| match err {
				Error::AuthFailure { .. } => err,
				other => Error::AuthFailure {
					status: other.status(),
					message: other.to_string(),
				},
			})?;

		let session = self
			.client
			.start_session(&token, object_uri, credentials)
			.await
			.map_err(|err| match err {
				Error::RemoteOperation { .. } => err,
				other => Error::RemoteOperation {
					operation: "start session",
					status: other.status(),
					body: other.to_string(),
				},
			})?;

		debug!(
			target = "amdp.session",
			session_id = %session.session_id,
			main_id = %session.main_id,
			"remote session created"
		);
		Ok((
			SessionAffinity {
				token,
				main_id: session.main_id,
			},
			session.session_id,
		))
	}

	/// Signals the worker to end the session and returns immediately.
	///
	/// Idempotent: succeeds when nothing is running. Teardown completes
	/// asynchronously in the worker's cleanup.
	pub fn stop(&self) -> Result<()> {
		let shared = self.shared.lock();
		if !shared.running {
			return Ok(());
		}
		if let Some(cancel) = &shared.cancel {
			debug!(target = "amdp.session", "stop requested");
			cancel.cancel();
		}
		Ok(())
	}

	/// Cancels the session and waits for the worker's cleanup to finish.
	pub async fn stop_and_wait(&self) -> Option<WorkerExit> {
		self.stop().ok()?;
		let handle = self.shared.lock().worker.take();
		match handle?.await {
			Ok(exit) => Some(exit),
			Err(err) => {
				warn!(target = "amdp.session", error = %err, "session worker did not finish cleanly");
				self.shared.lock().last_exit
			}
		}
	}

	pub fn is_running(&self) -> bool {
		self.shared.lock().running
	}

	/// Copy of the public session state.
	pub fn state(&self) -> SessionState {
		self.shared.lock().state.clone()
	}

	/// Why the most recent worker ended, if one has.
	pub fn last_exit(&self) -> Option<WorkerExit> {
		self.shared.lock().last_exit
	}

	/// Enqueues a command and waits for its reply.
	///
	/// Both waits are bounded separately. A caller that times out stops
	/// waiting; the command itself still runs.
	pub async fn send_command(&self, kind: CommandKind, args: CommandArgs) -> Result<Response> {
		let queue = {
			let shared = self.shared.lock();
			if !shared.running {
				return Err(Error::NotRunning);
			}
			shared.queue.clone().ok_or(Error::NotRunning)?
		};

		let (command, reply) = Command::new(kind, args);
		let enqueue_timeout = self.config.enqueue_timeout;
		match tokio::time::timeout(enqueue_timeout, queue.send(command)).await {
			Ok(Ok(())) => {}
			Ok(Err(_)) => return Err(Error::NotRunning),
			Err(_) => {
				warn!(target = "amdp.session", command = %kind, "command queue full");
				return Err(Error::QueueTimeout(enqueue_timeout));
			}
		}
		drop(queue);

		self.await_reply(kind, reply).await
	}

	async fn await_reply(&self, kind: CommandKind, reply: oneshot::Receiver<Result<Response>>) -> Result<Response> {
		let response_timeout = self.config.response_timeout;
		match tokio::time::timeout(response_timeout, reply).await {
			Ok(Ok(result)) => result,
			Ok(Err(_)) => Err(self.dropped_reply_error()),
			Err(_) => {
				warn!(target = "amdp.session", command = %kind, "no reply within bound");
				Err(Error::ResponseTimeout(response_timeout))
			}
		}
	}

	/// The worker went away holding our reply slot.
	fn dropped_reply_error(&self) -> Error {
		match self.shared.lock().last_exit {
			Some(WorkerExit::Fault) => Error::FaultTerminated("session worker faulted".to_string()),
			_ => Error::NotRunning,
		}
	}

	pub async fn step(&self, kind: StepKind) -> Result<Response> {
		let args = CommandArgs::new().with("kind", kind.as_str());
		self.send_command(CommandKind::Step, args).await
	}

	pub async fn status(&self) -> Result<Response> {
		self.send_command(CommandKind::GetStatus, CommandArgs::new()).await
	}

	pub async fn variables(&self) -> Result<Response> {
		self.send_command(CommandKind::GetVariables, CommandArgs::new()).await
	}

	pub async fn breakpoints(&self) -> Result<Response> {
		self.send_command(CommandKind::GetBreakpoints, CommandArgs::new()).await
	}

	pub async fn set_breakpoint(&self, procedure: &str, line: u32) -> Result<Response> {
		let args = CommandArgs::new().with("procedure", procedure).with("line", line);
		self.send_command(CommandKind::SetBreakpoint, args).await
	}
}

impl Drop for SessionManager {
	fn drop(&mut self) {
		if let Some(cancel) = self.shared.lock().cancel.take() {
			cancel.cancel();
		}
	}
}
