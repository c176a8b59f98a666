mod support;

use std::time::Duration;

use amdp_protocol::{CommandArgs, CommandKind, SessionState, SessionStatus, StepKind};
use amdp_runtime::{Error, SessionManager, WorkerExit};
use tokio_util::sync::CancellationToken;

use support::{FakeClient, credentials, manager, quiet_config, wait_stopped};

/// A mainID is held exactly while the status is active.
fn consistent_state(manager: &SessionManager) -> SessionState {
	let state = manager.state();
	assert_eq!(state.status.is_active(), !state.main_id.is_empty(), "{state:?}");
	state
}

#[tokio::test]
async fn start_step_and_stop_command() {
	let client = FakeClient::new();
	let manager = manager(&client, quiet_config());

	manager.start("/sap/bc/adt/oo/classes/zcl_demo", &credentials()).await.unwrap();
	let state = consistent_state(&manager);
	assert_eq!(state.status, SessionStatus::Running);
	assert_eq!(state.main_id, "MAIN-1");
	assert_eq!(state.session_id, "S-1");
	assert!(manager.is_running());

	let args = CommandArgs::new().with("kind", "over");
	let step = manager.send_command(CommandKind::Step, args).await.unwrap();
	assert!(step.success);
	assert_eq!(step.data["state"]["status"], "at_breakpoint");
	let paused = consistent_state(&manager);
	assert_eq!(paused.status, SessionStatus::AtBreakpoint);
	assert_eq!(paused.current_procedure.as_deref(), Some("CALC_over"));

	let stop = manager.send_command(CommandKind::Stop, CommandArgs::new()).await.unwrap();
	assert!(stop.success);
	let stopped = consistent_state(&manager);
	assert!(stopped.main_id.is_empty());
	assert_eq!(manager.stop_and_wait().await, Some(WorkerExit::Stopped));
	assert!(!manager.is_running());
	assert!(consistent_state(&manager).is_empty());

	assert_eq!(FakeClient::count(&client.calls.stop_session), 1);
	// Graceful stop already ended the remote session.
	assert_eq!(FakeClient::count(&client.calls.hard_stop), 0);
}

#[tokio::test]
async fn failed_stop_still_ends_session_with_hard_stop() {
	let client = FakeClient::new();
	client.fail_stop.store(true, std::sync::atomic::Ordering::SeqCst);
	let manager = manager(&client, quiet_config());
	manager.start("uri", &credentials()).await.unwrap();

	let reply = manager.send_command(CommandKind::Stop, CommandArgs::new()).await.unwrap();
	assert!(!reply.success);
	assert_eq!(reply.error_code(), Some("remote_operation_failure"));

	wait_stopped(&manager).await;
	assert_eq!(manager.last_exit(), Some(WorkerExit::Stopped));
	assert!(consistent_state(&manager).is_empty());
	assert_eq!(FakeClient::count(&client.calls.stop_session), 1);
	// The remote session may still exist, so cleanup ends it forcibly.
	assert_eq!(FakeClient::count(&client.calls.hard_stop), 1);
	assert_eq!(client.journal().last(), Some(&("hard_stop", "MAIN-1".to_string())));
}

#[tokio::test]
async fn second_start_is_rejected_and_keeps_session() {
	let client = FakeClient::new();
	let manager = manager(&client, quiet_config());

	manager.start("uri-a", &credentials()).await.unwrap();
	let before = manager.state();

	let err = manager.start("uri-b", &credentials()).await.unwrap_err();
	assert!(matches!(err, Error::AlreadyRunning));
	assert_eq!(manager.state(), before);
	assert_eq!(manager.state().main_id, "MAIN-1");
	assert_eq!(FakeClient::count(&client.calls.fetch_token), 1);
	assert_eq!(FakeClient::count(&client.calls.start_session), 1);

	manager.stop_and_wait().await;
}

#[tokio::test]
async fn command_without_session_makes_no_remote_call() {
	let client = FakeClient::new();
	let manager = manager(&client, quiet_config());

	let err = manager.variables().await.unwrap_err();
	assert!(matches!(err, Error::NotRunning));
	assert_eq!(client.calls.total(), 0);
}

#[tokio::test]
async fn command_after_cleanup_is_not_running() {
	let client = FakeClient::new();
	let manager = manager(&client, quiet_config());

	manager.start("uri", &credentials()).await.unwrap();
	manager.stop().unwrap();
	wait_stopped(&manager).await;
	let before = client.calls.session_calls();

	let err = manager
		.send_command(CommandKind::GetVariables, CommandArgs::new())
		.await
		.unwrap_err();
	assert!(matches!(err, Error::NotRunning));
	assert_eq!(client.calls.session_calls(), before);
	assert_eq!(FakeClient::count(&client.calls.get_variables), 0);
}

#[tokio::test]
async fn token_failure_aborts_start() {
	let client = FakeClient::new();
	client.fail_token.store(true, std::sync::atomic::Ordering::SeqCst);
	let manager = manager(&client, quiet_config());

	let err = manager.start("uri", &credentials()).await.unwrap_err();
	assert!(matches!(err, Error::AuthFailure { status: Some(401), .. }));
	assert!(!manager.is_running());
	assert!(manager.state().is_empty());
	assert_eq!(FakeClient::count(&client.calls.start_session), 0);
}

#[tokio::test]
async fn remote_start_failure_unwinds_and_allows_retry() {
	let client = FakeClient::new();
	client.fail_start.store(true, std::sync::atomic::Ordering::SeqCst);
	let manager = manager(&client, quiet_config());

	let err = manager.start("uri", &credentials()).await.unwrap_err();
	assert_eq!(err.code(), "remote_operation_failure");
	assert_eq!(err.status(), Some(500));
	assert!(!manager.is_running());

	client.fail_start.store(false, std::sync::atomic::Ordering::SeqCst);
	manager.start("uri", &credentials()).await.unwrap();
	assert!(manager.is_running());
	manager.stop_and_wait().await;
}

#[tokio::test]
async fn stop_is_idempotent_and_hard_stops_once() {
	let client = FakeClient::new();
	let manager = manager(&client, quiet_config());

	manager.stop().unwrap();
	manager.start("uri", &credentials()).await.unwrap();

	manager.stop().unwrap();
	manager.stop().unwrap();
	assert_eq!(manager.stop_and_wait().await, Some(WorkerExit::Cancelled));
	manager.stop().unwrap();

	assert!(!manager.is_running());
	assert_eq!(FakeClient::count(&client.calls.hard_stop), 1);
	assert_eq!(client.journal().last(), Some(&("hard_stop", "MAIN-1".to_string())));
	assert!(matches!(manager.status().await, Err(Error::NotRunning)));
}

#[tokio::test]
async fn parent_cancellation_ends_session() {
	let client = FakeClient::new();
	let manager = manager(&client, quiet_config());
	let parent = CancellationToken::new();

	manager.start_with_cancel("uri", &credentials(), &parent).await.unwrap();
	parent.cancel();
	wait_stopped(&manager).await;

	assert_eq!(manager.last_exit(), Some(WorkerExit::Cancelled));
	assert_eq!(FakeClient::count(&client.calls.hard_stop), 1);
	assert!(matches!(manager.step(StepKind::Over).await, Err(Error::NotRunning)));
}

#[tokio::test]
async fn restart_after_stop_gets_fresh_session() {
	let client = FakeClient::new();
	let manager = manager(&client, quiet_config());

	manager.start("uri", &credentials()).await.unwrap();
	manager.stop_and_wait().await;
	manager.start("uri", &credentials()).await.unwrap();

	assert_eq!(manager.state().main_id, "MAIN-2");
	assert_eq!(manager.last_exit(), None);
	manager.stop_and_wait().await;
}

#[tokio::test]
async fn dispatch_panic_terminates_session() {
	let client = FakeClient::new();
	client.panic_on_step.store(true, std::sync::atomic::Ordering::SeqCst);
	let manager = manager(&client, quiet_config());

	manager.start("uri", &credentials()).await.unwrap();
	let err = manager.step(StepKind::Into).await.unwrap_err();
	assert!(err.is_fatal());
	assert_eq!(err.code(), "fault_terminated");

	wait_stopped(&manager).await;
	assert_eq!(manager.last_exit(), Some(WorkerExit::Fault));
	assert_eq!(FakeClient::count(&client.calls.hard_stop), 1);
	assert!(matches!(manager.variables().await, Err(Error::NotRunning)));
}

#[tokio::test]
async fn dropping_manager_cancels_worker() {
	let client = FakeClient::new();
	let manager = manager(&client, quiet_config());
	manager.start("uri", &credentials()).await.unwrap();
	drop(manager);

	for _ in 0..200 {
		if FakeClient::count(&client.calls.hard_stop) == 1 {
			return;
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	panic!("worker never cleaned up after manager drop");
}
