//! Structured JSON logging (§10.1).
//!
//! Grounded on the teacher's telemetry initialization (`tracing-subscriber`
//! with an `EnvFilter` sourced from `RUST_LOG`) and the original's
//! `slog.NewJSONHandler` for the newline-delimited JSON wire shape.

use tracing_subscriber::EnvFilter;

pub fn init() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt()
		.json()
		.with_env_filter(filter)
		.with_target(true)
		.init();
}

/// Render an error's full cause chain as an ordered array of strings, the
/// practical equivalent of the original's `{function, source, line}`
/// stack-frame array (SPEC_FULL.md §7).
pub fn error_trace(err: &anyhow::Error) -> Vec<String> {
	err.chain().map(|cause| cause.to_string()).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn renders_full_cause_chain() {
		let err = anyhow::anyhow!("outer").context("middle").context("innermost");
		let trace = error_trace(&err);
		assert_eq!(trace, vec!["innermost", "middle", "outer"]);
	}
}
