//! Line-delimited JSON request loop.
//!
//! Each input line is one independent request, handled on its own task so
//! slow commands never hold up reading. Replies are written one per line in
//! completion order; callers correlate them by `id`.

use std::sync::Arc;

use amdp_protocol::{CommandKind, CommandReply, CommandRequest, Response, ResponseError};
use amdp_runtime::{Credentials, SessionManager};
use anyhow::{Context, Result};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a request handler needs besides the manager.
#[derive(Clone)]
pub struct ServeContext {
	pub manager: Arc<SessionManager>,
	pub credentials: Credentials,
	/// Used by `start` requests that name no object.
	pub object_uri: String,
	/// Process-wide scope; sessions started here end with it.
	pub shutdown: CancellationToken,
}

/// Serves requests from `input` until EOF or `shutdown`, then ends the session.
pub async fn serve<R, W>(ctx: ServeContext, input: R, output: W) -> Result<()>
where
	R: AsyncRead + Unpin,
	W: AsyncWrite + Unpin + Send + 'static,
{
	let (reply_tx, reply_rx) = mpsc::unbounded_channel();
	let writer = tokio::spawn(write_replies(output, reply_rx));
	let mut lines = BufReader::new(input).lines();
	let mut tasks = JoinSet::new();
	let shutdown = ctx.shutdown.clone();

	let interrupted = loop {
		tokio::select! {
			_ = shutdown.cancelled() => break true,
			Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
			line = lines.next_line() => {
				let Some(line) = line.context("Failed reading request")? else {
					debug!(target = "amdp.cli", "input closed");
					break false;
				};
				if line.trim().is_empty() {
					continue;
				}
				let ctx = ctx.clone();
				let reply_tx = reply_tx.clone();
				tasks.spawn(async move {
					let reply = handle_line(&ctx, &line).await;
					let _ = reply_tx.send(reply);
				});
			}
		}
	};

	if interrupted {
		info!(target = "amdp.cli", "shutdown requested");
		// Queued commands are answered by the worker's cleanup.
		ctx.manager.stop_and_wait().await;
		while tasks.join_next().await.is_some() {}
	} else {
		while tasks.join_next().await.is_some() {}
		ctx.manager.stop_and_wait().await;
	}

	drop(reply_tx);
	writer.await.context("Reply writer panicked")?
}

async fn write_replies<W>(mut output: W, mut replies: mpsc::UnboundedReceiver<CommandReply>) -> Result<()>
where
	W: AsyncWrite + Unpin,
{
	while let Some(reply) = replies.recv().await {
		let payload = serde_json::to_string(&reply).context("Failed to serialize reply")?;
		output
			.write_all(format!("{payload}\n").as_bytes())
			.await
			.context("Failed writing reply")?;
		output.flush().await.context("Failed flushing reply")?;
	}
	Ok(())
}

/// Turns one input line into exactly one reply.
pub async fn handle_line(ctx: &ServeContext, line: &str) -> CommandReply {
	let request = match serde_json::from_str::<CommandRequest>(line.trim()) {
		Ok(request) => request,
		Err(err) => {
			return CommandReply {
				id: None,
				response: invalid_request(format!("malformed request: {err}")),
			};
		}
	};

	let id = request.id.clone();
	let response = handle_request(ctx, request).await;
	CommandReply { id, response }
}

async fn handle_request(ctx: &ServeContext, request: CommandRequest) -> Response {
	if request.command == "state" {
		return Response::ok(json!({
			"running": ctx.manager.is_running(),
			"state": ctx.manager.state(),
		}));
	}

	let kind = match request.command.parse::<CommandKind>() {
		Ok(kind) => kind,
		Err(err) => return invalid_request(err.to_string()),
	};

	let result = match kind {
		CommandKind::Start => {
			let object_uri = request
				.args
				.str_arg("object_uri")
				.or_else(|| request.args.str_arg("objectUri"))
				.unwrap_or(ctx.object_uri.as_str());
			ctx.manager
				.start_with_cancel(object_uri, &ctx.credentials, &ctx.shutdown)
				.await
				.map(|()| Response::ok(json!({ "state": ctx.manager.state() })))
		}
		_ => ctx.manager.send_command(kind, request.args).await,
	};

	match result {
		Ok(response) => response,
		Err(err) => {
			if err.is_fatal() {
				warn!(target = "amdp.cli", command = %kind, error = %err, "session ended by fault");
			}
			Response::failure(err.to_response_error())
		}
	}
}

fn invalid_request(message: String) -> Response {
	Response::failure(ResponseError {
		code: "invalid_request".to_string(),
		message,
		status: None,
	})
}
