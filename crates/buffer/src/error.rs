//! Error types for buffer synchronization.

use std::path::PathBuf;

use bufsync_codec::UnsupportedFormat;
use bufsync_rpc::{HostError, Value, WinId};
use thiserror::Error;

/// Possible errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
	/// A host call, option access, hook registration, or command failed.
	///
	/// Propagated unchanged and never retried.
	#[error(transparent)]
	Host(#[from] HostError),
	/// No usable line-ending convention could be determined.
	#[error(transparent)]
	UnsupportedFormat(#[from] UnsupportedFormat),
	/// The host answered with a value of the wrong shape.
	#[error("unexpected host value for {what}: {value}")]
	UnexpectedValue {
		/// What was being read.
		what: &'static str,
		/// The offending value.
		value: Value,
	},
	/// A window to switch to no longer exists.
	#[error("window {0} no longer exists")]
	NoWindow(WinId),
	/// The host invoked a routine this session never registered.
	#[error("unknown routine: {0}")]
	UnknownRoutine(String),
	/// The host invoked a routine with malformed arguments.
	#[error("invalid arguments for {routine}: {reason}")]
	InvalidArguments {
		/// Routine name.
		routine: String,
		/// What was wrong.
		reason: String,
	},
	/// Restoring guard flags or focus failed after the wrapped action ran.
	///
	/// `primary` carries the action's own error when it failed as well.
	#[error("failed to restore buffer state: {source}")]
	Restore {
		/// The restoration failure.
		source: Box<Error>,
		/// The wrapped action's failure, if any.
		primary: Option<Box<Error>>,
	},
	/// Configuration could not be loaded.
	#[error(transparent)]
	Config(#[from] ConfigError),
}

impl Error {
	pub(crate) fn unexpected(what: &'static str, value: Value) -> Self {
		Error::UnexpectedValue { what, value }
	}

	pub(crate) fn invalid_args(routine: &str, reason: impl Into<String>) -> Self {
		Error::InvalidArguments {
			routine: routine.to_string(),
			reason: reason.into(),
		}
	}
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error parsing TOML syntax or shape.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// A value parsed but is unusable.
	#[error("invalid configuration: {0}")]
	Invalid(String),
}

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
