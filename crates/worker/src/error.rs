//! Error types for thread supervision and per-thread statistics.

use std::io;

/// A convenient type alias for `Result` with `E` = [`enum@ThreadError`].
pub type Result<T, E = ThreadError> = std::result::Result<T, E>;

/// Errors surfaced to callers launching supervised threads.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ThreadError {
	/// The platform refused to create another native thread.
	#[error("failed to spawn thread '{name}': {source}")]
	Spawn {
		/// Requested thread name.
		name: String,
		/// The underlying spawn failure.
		#[source]
		source: io::Error,
	},
}

/// Failures while reading cumulative CPU and IO-wait times for one thread.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StatsError {
	/// `/proc` lookup or parse failure.
	#[error("procfs: {0}")]
	Procfs(String),
	/// The OS thread id was never resolved, so there is nothing to look up.
	#[error("thread id {0} is not a valid OS thread id")]
	InvalidTid(i64),
	/// Per-thread statistics are not available on this platform.
	#[error("per-thread statistics are unsupported on this platform")]
	Unsupported,
	/// Any other collaborator-specific failure.
	#[error("{0}")]
	Other(String),
}

#[cfg(target_os = "linux")]
impl From<procfs::ProcError> for StatsError {
	fn from(error: procfs::ProcError) -> Self {
		Self::Procfs(error.to_string())
	}
}

/// Errors that can occur when parsing threading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// Error parsing TOML syntax or types.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// A field was present but holds an unusable value.
	#[error("invalid value for '{field}': {reason}")]
	Invalid {
		/// The offending key.
		field: &'static str,
		/// Why it was rejected.
		reason: &'static str,
	},
}
