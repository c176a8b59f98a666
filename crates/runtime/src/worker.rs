//! The session worker: sole owner of a live remote debug session.
//!
//! One worker task exists per active session. It drains the command queue in
//! order, issues at most one remote call at a time, and pings the remote
//! session on a keepalive tick merged into the same event loop. Every exit
//! path (stop command, cancellation, fault, closed queue) runs cleanup exactly
//! once.
//!
//! ```text
//!   SessionManager::send_command ──mpsc──▶ ┌──────────────────────────┐
//!                                          │ SessionWorker            │
//!   SessionManager::stop ──cancel token──▶ │  select! { cancel,       │──▶ RemoteSessionClient
//!                                          │            keepalive,    │
//!   caller ◀──────────── oneshot ───────── │            command }     │
//!                                          └──────────────────────────┘
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use amdp_protocol::{CommandArgs, CommandKind, Response, SessionState, SessionStatus};
use futures_util::FutureExt;
use serde_json::{Value, json};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::{RemoteSessionClient, SessionAffinity};
use crate::error::{Error, Result};
use crate::manager::SharedState;
use crate::queue::{Command, CommandReceiver, reject_pending};

/// Why a session worker left its event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
	/// A `Stop` command was processed.
	Stopped,
	/// The session's cancellation token fired.
	Cancelled,
	/// A dispatch panicked; the remote session is in an unknown state.
	Fault,
	/// Every queue sender was dropped.
	QueueClosed,
	/// The worker task was dropped before it could clean up.
	Aborted,
}

impl WorkerExit {
	pub fn as_str(self) -> &'static str {
		match self {
			WorkerExit::Stopped => "stopped",
			WorkerExit::Cancelled => "cancelled",
			WorkerExit::Fault => "fault",
			WorkerExit::QueueClosed => "queue_closed",
			WorkerExit::Aborted => "aborted",
		}
	}
}

/// Resets the shared session record if the worker is dropped mid-flight.
///
/// Covers task abort and runtime shutdown, where `cleanup` never gets to run.
/// No remote hard stop is possible from `Drop`.
struct CleanupGuard {
	shared: SharedState,
	armed: bool,
}

impl CleanupGuard {
	fn disarm(&mut self) {
		self.armed = false;
	}
}

impl Drop for CleanupGuard {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}
		warn!(target = "amdp.worker", "worker dropped before cleanup; resetting session record");
		self.shared.lock().reset(Some(WorkerExit::Aborted));
	}
}

pub(crate) struct SessionWorker {
	client: Arc<dyn RemoteSessionClient>,
	shared: SharedState,
	state: SessionState,
	affinity: SessionAffinity,
	commands: CommandReceiver,
	cancel: CancellationToken,
	keepalive_interval: Duration,
}

impl SessionWorker {
	pub(crate) fn new(
		client: Arc<dyn RemoteSessionClient>,
		shared: SharedState,
		state: SessionState,
		affinity: SessionAffinity,
		commands: CommandReceiver,
		cancel: CancellationToken,
		keepalive_interval: Duration,
	) -> Self {
		Self {
			client,
			shared,
			state,
			affinity,
			commands,
			cancel,
			keepalive_interval: keepalive_interval.max(Duration::from_millis(1)),
		}
	}

	/// Runs the event loop, then cleanup. Returns why the loop ended.
	pub(crate) async fn run(mut self) -> WorkerExit {
		let mut guard = CleanupGuard {
			shared: Arc::clone(&self.shared),
			armed: true,
		};

		info!(
			target = "amdp.worker",
			main_id = %self.state.main_id,
			object_uri = %self.state.object_uri,
			"session worker started"
		);

		let exit = self.event_loop().await;
		self.cleanup(exit).await;
		guard.disarm();
		exit
	}

	async fn event_loop(&mut self) -> WorkerExit {
		let period = self.keepalive_interval;
		let mut keepalive = tokio::time::interval_at(Instant::now() + period, period);
		keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				biased;

				_ = self.cancel.cancelled() => {
					debug!(target = "amdp.worker", "cancellation observed");
					return WorkerExit::Cancelled;
				}
				_ = keepalive.tick() => self.keepalive().await,
				command = self.commands.recv() => {
					let Some(command) = command else {
						return WorkerExit::QueueClosed;
					};
					if let Some(exit) = self.process(command).await {
						return exit;
					}
				}
			}
		}
	}

	/// Handles one command. Returns `Some` when the loop must end.
	async fn process(&mut self, command: Command) -> Option<WorkerExit> {
		let Command { kind, args, reply } = command;
		debug!(target = "amdp.worker", command = %kind, "dispatching command");

		let outcome = AssertUnwindSafe(self.dispatch(kind, &args)).catch_unwind().await;

		match outcome {
			Ok(result) => {
				let response = match result {
					Ok(data) => Response::ok(data),
					Err(err) => {
						warn!(target = "amdp.worker", command = %kind, error = %err, "command failed");
						Response::failure(err.to_response_error())
					}
				};
				self.publish();
				if !reply.deliver(Ok(response)) {
					debug!(target = "amdp.worker", command = %kind, "caller abandoned reply; dropped");
				}
				(kind == CommandKind::Stop).then_some(WorkerExit::Stopped)
			}
			Err(panic) => {
				let message = panic_message(&*panic);
				error!(
					target = "amdp.worker",
					command = %kind,
					panic = %message,
					"fault during dispatch; terminating session"
				);
				reply.deliver(Err(Error::FaultTerminated(message)));
				Some(WorkerExit::Fault)
			}
		}
	}

	async fn dispatch(&mut self, kind: CommandKind, args: &CommandArgs) -> Result<Value> {
		match kind {
			CommandKind::Start => Err(Error::AlreadyRunning),
			CommandKind::Step => {
				let step = args.step_kind()?;
				let outcome = self.client.step(&self.affinity, step).await?;
				self.apply_position(outcome.status, outcome.line, outcome.procedure.clone());
				Ok(json!({ "step": step, "result": outcome, "state": self.state }))
			}
			CommandKind::GetStatus => {
				let report = self.client.get_status(&self.affinity).await?;
				self.apply_position(report.status, report.line, report.procedure.clone());
				Ok(json!({ "state": self.state, "report": report }))
			}
			CommandKind::GetVariables => {
				let variables = self.client.get_variables(&self.affinity).await?;
				Ok(json!(variables))
			}
			CommandKind::GetBreakpoints => {
				let breakpoints = self.client.get_breakpoints(&self.affinity).await?;
				Ok(json!(breakpoints))
			}
			CommandKind::SetBreakpoint => {
				let (procedure, line) = args.breakpoint_location()?;
				self.client
					.set_breakpoint(&self.affinity, &procedure, line)
					.await?;
				Ok(json!({ "procedure": procedure, "line": line }))
			}
			CommandKind::Stop => {
				self.state.status = SessionStatus::Stopping;
				self.publish();
				self.client.stop_session(&self.affinity).await?;
				// Remote side is gone; nothing left for cleanup to hard-stop.
				self.state.main_id.clear();
				self.state.status = SessionStatus::Idle;
				self.state.clear_position();
				Ok(Value::Null)
			}
		}
	}

	/// Folds a remote position report into the owned state.
	fn apply_position(&mut self, status: Option<SessionStatus>, line: Option<u32>, procedure: Option<String>) {
		match status {
			Some(SessionStatus::AtBreakpoint) => self.state.status = SessionStatus::AtBreakpoint,
			Some(SessionStatus::Running) => {
				self.state.status = SessionStatus::Running;
				self.state.clear_position();
			}
			// Idle/Starting/Stopping are driven locally, not by remote reports.
			_ => {}
		}
		if line.is_some() {
			self.state.current_line = line;
		}
		if procedure.is_some() {
			self.state.current_procedure = procedure;
		}
	}

	async fn keepalive(&mut self) {
		if self.state.main_id.is_empty() {
			return;
		}
		let ping = AssertUnwindSafe(self.client.keepalive(&self.affinity)).catch_unwind().await;
		match ping {
			Ok(Ok(())) => debug!(target = "amdp.worker", "keepalive ok"),
			Ok(Err(err)) => warn!(target = "amdp.worker", error = %err, "keepalive failed"),
			Err(panic) => warn!(
				target = "amdp.worker",
				panic = %panic_message(&*panic),
				"keepalive panicked"
			),
		}
	}

	/// Publishes the owned state for `SessionManager::state` readers.
	fn publish(&self) {
		debug_assert_eq!(
			self.state.status.is_active(),
			!self.state.main_id.is_empty(),
			"main id held outside an active status: {:?}",
			self.state
		);
		self.shared.lock().state = self.state.clone();
	}

	async fn cleanup(&mut self, exit: WorkerExit) {
		if !self.state.main_id.is_empty() {
			debug!(target = "amdp.worker", main_id = %self.state.main_id, "hard-stopping remote session");
			let stopped = AssertUnwindSafe(self.client.hard_stop(&self.affinity))
				.catch_unwind()
				.await;
			if let Err(panic) = stopped {
				warn!(
					target = "amdp.worker",
					panic = %panic_message(&*panic),
					"hard stop panicked"
				);
			}
		}

		let pending_err = match exit {
			WorkerExit::Fault => Error::FaultTerminated("session terminated before command ran".to_string()),
			_ => Error::NotRunning,
		};
		let rejected = reject_pending(&mut self.commands, &pending_err);

		self.state = SessionState::default();
		self.shared.lock().reset(Some(exit));

		info!(
			target = "amdp.worker",
			exit = exit.as_str(),
			rejected,
			"session worker finished"
		);
	}
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
	if let Some(message) = panic.downcast_ref::<&str>() {
		(*message).to_string()
	} else if let Some(message) = panic.downcast_ref::<String>() {
		message.clone()
	} else {
		"unknown panic".to_string()
	}
}
