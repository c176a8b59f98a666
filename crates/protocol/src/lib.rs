//! Data types for AMDP debug sessions.
//!
//! This crate contains the serde-serializable types shared between the
//! session runtime and its callers:
//!
//! - **Session state**: [`SessionState`] and its [`SessionStatus`] machine
//! - **Commands**: [`CommandKind`], loosely typed [`CommandArgs`], [`StepKind`]
//! - **Replies**: [`Response`] with a structured [`ResponseError`]
//! - **Remote results**: [`StepOutcome`], [`StatusReport`], [`Variable`], [`Breakpoint`]
//! - **Envelope**: [`CommandRequest`] / [`CommandReply`] for line-delimited JSON callers
//!
//! Types here carry no I/O. Behaviour is limited to parsing and small accessors.

pub mod command;
pub mod response;
pub mod session;

pub use command::*;
pub use response::*;
pub use session::*;
