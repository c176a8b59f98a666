use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "amdp")]
#[command(about = "Persistent AMDP debug session driven by line-delimited JSON on stdin")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// JSON config file; flags override its values
	#[arg(short, long, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Base URL of the ABAP system, e.g. https://host:44300
	#[arg(long, value_name = "URL")]
	pub base_url: Option<String>,

	/// System client number (sap-client)
	#[arg(long = "client", value_name = "NNN")]
	pub sap_client: Option<String>,

	#[arg(short, long)]
	pub user: Option<String>,

	/// Password; falls back to AMDP_PASSWORD, then the config file
	#[arg(long)]
	pub password: Option<String>,

	/// Accept invalid TLS certificates
	#[arg(long)]
	pub insecure: bool,

	/// Bound on waiting for the session worker to accept a command
	#[arg(long, value_name = "MS")]
	pub enqueue_timeout_ms: Option<u64>,

	/// Bound on waiting for a command's reply
	#[arg(long, value_name = "MS")]
	pub response_timeout_ms: Option<u64>,

	/// Keepalive period for the remote session
	#[arg(long, value_name = "MS")]
	pub keepalive_ms: Option<u64>,

	/// Bound on each remote HTTP call
	#[arg(long, value_name = "MS")]
	pub request_timeout_ms: Option<u64>,

	/// ADT URI of the AMDP object to debug
	#[arg(value_name = "OBJECT_URI")]
	pub object_uri: Option<String>,
}
