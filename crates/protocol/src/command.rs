//! Command kinds and their loosely typed arguments.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::response::Response;

/// Error returned when a command, step kind or argument cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ParseError(pub String);

/// Operation requested of the session worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
	Start,
	Stop,
	Step,
	GetStatus,
	GetVariables,
	GetBreakpoints,
	SetBreakpoint,
}

impl CommandKind {
	pub const ALL: [CommandKind; 7] = [
		Self::Start,
		Self::Stop,
		Self::Step,
		Self::GetStatus,
		Self::GetVariables,
		Self::GetBreakpoints,
		Self::SetBreakpoint,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Start => "start",
			Self::Stop => "stop",
			Self::Step => "step",
			Self::GetStatus => "get_status",
			Self::GetVariables => "get_variables",
			Self::GetBreakpoints => "get_breakpoints",
			Self::SetBreakpoint => "set_breakpoint",
		}
	}
}

impl fmt::Display for CommandKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for CommandKind {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
		Self::ALL
			.into_iter()
			.find(|kind| kind.as_str() == normalized)
			.ok_or_else(|| ParseError(format!("unknown command: {s}")))
	}
}

/// Kind of step to perform inside a suspended debuggee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
	#[default]
	Over,
	Into,
	Out,
	Continue,
}

impl StepKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Over => "over",
			Self::Into => "into",
			Self::Out => "out",
			Self::Continue => "continue",
		}
	}

	/// Spelling used in the remote step configuration.
	pub fn remote_name(self) -> &'static str {
		match self {
			Self::Over => "stepOver",
			Self::Into => "stepInto",
			Self::Out => "stepReturn",
			Self::Continue => "stepContinue",
		}
	}
}

impl FromStr for StepKind {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"over" | "stepover" | "step_over" => Ok(Self::Over),
			"into" | "stepinto" | "step_into" => Ok(Self::Into),
			"out" | "return" | "stepreturn" | "step_return" => Ok(Self::Out),
			"continue" | "resume" | "stepcontinue" => Ok(Self::Continue),
			other => Err(ParseError(format!("unknown step kind: {other}"))),
		}
	}
}

/// Name to value mapping carried with a command.
///
/// Values are loosely typed; accessors accept the common JSON spellings
/// (numbers may arrive as strings from tool callers).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandArgs(pub Map<String, Value>);

impl CommandArgs {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an argument, replacing any previous value under `name`.
	pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
		self.0.insert(name.to_string(), value.into());
		self
	}

	pub fn str_arg(&self, name: &str) -> Option<&str> {
		self.0.get(name).and_then(Value::as_str)
	}

	pub fn u32_arg(&self, name: &str) -> Option<u32> {
		match self.0.get(name)? {
			Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
			Value::String(s) => s.trim().parse().ok(),
			_ => None,
		}
	}

	/// Step kind from `kind` (or the older `step_type` key); defaults to [`StepKind::Over`].
	pub fn step_kind(&self) -> Result<StepKind, ParseError> {
		match self.str_arg("kind").or_else(|| self.str_arg("step_type")) {
			Some(raw) => raw.parse(),
			None => Ok(StepKind::default()),
		}
	}

	/// Breakpoint location from `procedure` (or `proc_name`) and `line`.
	pub fn breakpoint_location(&self) -> Result<(String, u32), ParseError> {
		let procedure = self
			.str_arg("procedure")
			.or_else(|| self.str_arg("proc_name"))
			.filter(|p| !p.trim().is_empty())
			.ok_or_else(|| ParseError("set_breakpoint requires 'procedure'".to_string()))?;
		let line = self
			.u32_arg("line")
			.filter(|line| *line > 0)
			.ok_or_else(|| ParseError("set_breakpoint requires a positive 'line'".to_string()))?;
		Ok((procedure.to_string(), line))
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

/// One line-delimited request from an external caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
	/// Caller-chosen identifier echoed in the reply.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<Value>,
	/// Command name, or `state` for a snapshot read.
	pub command: String,
	#[serde(default)]
	pub args: CommandArgs,
}

/// Reply written for a [`CommandRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandReply {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<Value>,
	#[serde(flatten)]
	pub response: Response,
}
