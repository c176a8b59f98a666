//! AMDP Runtime - persistent debug session manager
//!
//! Bridges stateless callers (each tool invocation independent, arriving on
//! any task) to one long-lived, stateful remote AMDP debug session:
//!
//! - **Manager**: public facade; start/stop lifecycle, snapshot reads, bounded
//!   command submission
//! - **Queue**: ordered hand-off from many callers to one worker, each command
//!   carrying a private reply slot
//! - **Worker**: the actor owning all session state; dispatch, keepalive,
//!   fault boundary and cleanup
//! - **Client**: the remote operation contract, with an HTTP implementation
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ handlers / CLI   │  many concurrent callers
//! └────────┬─────────┘
//!          │ send_command / start / stop
//! ┌────────▼─────────┐
//! │  SessionManager  │  running flag + snapshot (locked)
//! └────────┬─────────┘
//!          │ mpsc + oneshot
//! ┌────────▼─────────┐
//! │  SessionWorker   │  sole owner of token, mainId, status
//! └────────┬─────────┘
//!          │ RemoteSessionClient
//! ┌────────▼─────────┐
//! │ HttpSessionClient│  ADT AMDP debugger endpoints
//! └──────────────────┘
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod manager;
pub mod queue;
pub mod worker;

// Re-export key types at crate root
pub use client::{AntiReplayToken, RemoteSession, RemoteSessionClient, SessionAffinity};
pub use config::{ClientConfig, Credentials, SessionConfig};
pub use error::{Error, Result};
pub use http::HttpSessionClient;
pub use manager::SessionManager;
pub use worker::WorkerExit;
