//! Stderr tracing. Stdout belongs to the reply stream.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Filter directives for a `-v` count.
///
/// Quiet by default; `-v` shows the session lifecycle, `-vv` adds every
/// remote request with the HTTP stack's own chatter held back.
pub fn directives(verbosity: u8) -> &'static str {
	match verbosity {
		0 => "error",
		1 => "warn,amdp=info",
		_ => "debug,hyper=info,hyper_util=info,reqwest=info",
	}
}

/// Installs the global subscriber. `RUST_LOG` wins over the `-v` count.
pub fn init_logging(verbosity: u8) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(verbosity)));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(std::io::stderr().is_terminal())
		.with_target(true)
		.compact()
		.init();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn verbosity_widens_filter() {
		assert_eq!(directives(0), "error");
		assert!(directives(1).contains("amdp=info"));
		assert_eq!(directives(2), directives(5));
		assert!(directives(2).starts_with("debug"));
	}

	#[test]
	fn directives_parse() {
		for level in 0..3 {
			EnvFilter::try_new(directives(level)).unwrap();
		}
	}
}
