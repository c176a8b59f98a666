//! `amdp`: serves a persistent AMDP debug session over stdin/stdout.
//!
//! Each stdin line is a JSON request (`{"id": 1, "command": "step", "args": {"kind": "over"}}`)
//! and gets exactly one JSON reply line on stdout. Logs go to stderr.

pub mod cli;
pub mod config;
pub mod logging;
pub mod serve;

use std::sync::Arc;

use amdp_runtime::SessionManager;
use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::Cli;
use crate::config::{FileConfig, PASSWORD_ENV, Settings};
use crate::serve::ServeContext;

/// Resolves settings, opens the session and serves stdin until EOF or Ctrl-C.
pub async fn run(cli: Cli) -> Result<()> {
	let file = match &cli.config {
		Some(path) => config::load_file(path)?,
		None => FileConfig::default(),
	};
	let settings = Settings::resolve(&cli, file, std::env::var(PASSWORD_ENV).ok())?;

	let manager = SessionManager::http(settings.client.clone(), settings.session.clone())
		.context("Failed to build AMDP client")?;
	let manager = Arc::new(manager);

	let shutdown = CancellationToken::new();
	tokio::spawn({
		let shutdown = shutdown.clone();
		async move {
			match tokio::signal::ctrl_c().await {
				Ok(()) => info!(target = "amdp.cli", "received SIGINT, shutting down"),
				Err(err) => warn!(target = "amdp.cli", error = %err, "failed to listen for SIGINT"),
			}
			shutdown.cancel();
		}
	});

	manager
		.start_with_cancel(&settings.object_uri, &settings.credentials, &shutdown)
		.await
		.with_context(|| format!("Failed to start AMDP session for {}", settings.object_uri))?;
	info!(
		target = "amdp.cli",
		object_uri = %settings.object_uri,
		main_id = %manager.state().main_id,
		"session ready"
	);

	let ctx = ServeContext {
		manager,
		credentials: settings.credentials,
		object_uri: settings.object_uri,
		shutdown,
	};
	serve::serve(ctx, tokio::io::stdin(), tokio::io::stdout()).await
}
