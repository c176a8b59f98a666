//! Settings resolution: JSON config file, then environment, then flags.

use std::path::Path;
use std::time::Duration;

use amdp_runtime::{ClientConfig, Credentials, SessionConfig};
use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::cli::Cli;

pub const PASSWORD_ENV: &str = "AMDP_PASSWORD";

/// Contents of the optional `--config` file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileConfig {
	pub connection: Option<ClientConfig>,
	pub session: SessionConfig,
	pub user: Option<String>,
	pub password: Option<String>,
	pub object_uri: Option<String>,
}

pub fn load_file(path: &Path) -> Result<FileConfig> {
	let raw = std::fs::read_to_string(path)
		.with_context(|| format!("Failed to read config file: {}", path.display()))?;
	serde_json::from_str(&raw).with_context(|| format!("Invalid config file: {}", path.display()))
}

/// Everything needed to open a session and serve commands.
#[derive(Debug, Clone)]
pub struct Settings {
	pub client: ClientConfig,
	pub session: SessionConfig,
	pub credentials: Credentials,
	pub object_uri: String,
}

impl Settings {
	pub fn resolve(cli: &Cli, file: FileConfig, env_password: Option<String>) -> Result<Self> {
		let mut client = file.connection.unwrap_or_default();
		if let Some(base_url) = &cli.base_url {
			client.base_url = base_url.clone();
		}
		client.base_url = client.base_url.trim_end_matches('/').to_string();
		if let Some(sap_client) = &cli.sap_client {
			client.sap_client = sap_client.clone();
		}
		if cli.insecure {
			client.insecure = true;
		}
		if let Some(ms) = cli.request_timeout_ms {
			client.request_timeout = Duration::from_millis(ms);
		}
		if client.base_url.is_empty() {
			bail!("No base URL: pass --base-url or set connection.baseUrl in the config file");
		}

		let mut session = file.session;
		if let Some(ms) = cli.enqueue_timeout_ms {
			session.enqueue_timeout = Duration::from_millis(ms);
		}
		if let Some(ms) = cli.response_timeout_ms {
			session.response_timeout = Duration::from_millis(ms);
		}
		if let Some(ms) = cli.keepalive_ms {
			session.keepalive_interval = Duration::from_millis(ms);
		}

		let user = cli.user.clone().or(file.user).context("No user: pass --user or set user in the config file")?;
		let password = cli
			.password
			.clone()
			.or(env_password)
			.or(file.password)
			.with_context(|| format!("No password: pass --password or set {PASSWORD_ENV}"))?;
		let object_uri = cli
			.object_uri
			.clone()
			.or(file.object_uri)
			.context("No object URI: pass OBJECT_URI or set objectUri in the config file")?;

		Ok(Self {
			client,
			session,
			credentials: Credentials::new(user, password),
			object_uri,
		})
	}
}
