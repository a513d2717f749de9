//! Host call failures.

use thiserror::Error;

/// A failure reported by, or while talking to, the host editor.
///
/// The core propagates these unchanged and never retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum HostError {
	/// A named host call was rejected.
	#[error("host call {name} failed: {message}")]
	Call {
		/// Routine or function name.
		name: String,
		/// Host-supplied message.
		message: String,
	},
	/// A host script command was rejected.
	#[error("host command {command:?} failed: {message}")]
	Command {
		/// Command text as submitted.
		command: String,
		/// Host-supplied message.
		message: String,
	},
	/// The transport to the host is gone.
	#[error("host transport disconnected")]
	Disconnected,
	/// The host replied with something the transport could not interpret.
	#[error("protocol error: {0}")]
	Protocol(String),
}

/// Result alias for host collaborator calls.
pub type HostResult<T> = std::result::Result<T, HostError>;
