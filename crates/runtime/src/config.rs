//! Session and client configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default bound on waiting for the worker to accept a command.
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default bound on waiting for a command's reply.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);
/// Default keepalive period; the remote system expires idle sessions.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
/// Default bound on any single remote call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Tuning for the session manager and its worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
	/// Commands that may wait in the queue before producers block.
	pub queue_capacity: usize,
	#[serde(with = "millis")]
	pub enqueue_timeout: Duration,
	#[serde(with = "millis")]
	pub response_timeout: Duration,
	#[serde(with = "millis")]
	pub keepalive_interval: Duration,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			queue_capacity: DEFAULT_QUEUE_CAPACITY,
			enqueue_timeout: DEFAULT_ENQUEUE_TIMEOUT,
			response_timeout: DEFAULT_RESPONSE_TIMEOUT,
			keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
		}
	}
}

impl SessionConfig {
	pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
		self.queue_capacity = capacity.max(1);
		self
	}

	pub fn with_enqueue_timeout(mut self, timeout: Duration) -> Self {
		self.enqueue_timeout = timeout;
		self
	}

	pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
		self.response_timeout = timeout;
		self
	}

	pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
		self.keepalive_interval = interval;
		self
	}
}

/// Connection settings for [`HttpSessionClient`](crate::HttpSessionClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
	/// Scheme, host and port of the remote system, without trailing slash.
	pub base_url: String,
	/// System client number sent as `sap-client`.
	pub sap_client: String,
	/// Accept invalid TLS certificates.
	pub insecure: bool,
	#[serde(with = "millis")]
	pub request_timeout: Duration,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			base_url: String::new(),
			sap_client: "001".to_string(),
			insecure: false,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
		}
	}
}

impl ClientConfig {
	pub fn new(base_url: impl Into<String>, sap_client: impl Into<String>) -> Self {
		Self {
			base_url: base_url.into().trim_end_matches('/').to_string(),
			sap_client: sap_client.into(),
			..Default::default()
		}
	}

	pub fn with_insecure(mut self, insecure: bool) -> Self {
		self.insecure = insecure;
		self
	}

	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}
}

/// User credentials for token fetch and session creation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
	pub user: String,
	pub password: String,
}

impl Credentials {
	pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
		Self {
			user: user.into(),
			password: password.into(),
		}
	}
}

impl fmt::Debug for Credentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credentials")
			.field("user", &self.user)
			.field("password", &"<redacted>")
			.finish()
	}
}

mod millis {
	use std::time::Duration;

	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u64(value.as_millis() as u64)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
		u64::deserialize(deserializer).map(Duration::from_millis)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn session_config_defaults_match_remote_expectations() {
		let config = SessionConfig::default();
		assert_eq!(config.queue_capacity, 10);
		assert_eq!(config.enqueue_timeout, Duration::from_secs(5));
		assert_eq!(config.response_timeout, Duration::from_secs(60));
		assert_eq!(config.keepalive_interval, Duration::from_secs(30));
	}

	#[test]
	fn partial_json_keeps_defaults() {
		let config: SessionConfig =
			serde_json::from_value(json!({"keepaliveInterval": 1500})).unwrap();
		assert_eq!(config.keepalive_interval, Duration::from_millis(1500));
		assert_eq!(config.response_timeout, DEFAULT_RESPONSE_TIMEOUT);
	}

	#[test]
	fn client_config_trims_trailing_slash() {
		let config = ClientConfig::new("https://host:44300/", "100");
		assert_eq!(config.base_url, "https://host:44300");
		assert_eq!(config.sap_client, "100");
	}

	#[test]
	fn credentials_debug_redacts_password() {
		let creds = Credentials::new("DEVELOPER", "s3cret");
		let debug = format!("{creds:?}");
		assert!(debug.contains("DEVELOPER"));
		assert!(!debug.contains("s3cret"));
	}
}
