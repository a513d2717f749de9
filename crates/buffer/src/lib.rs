//! Transactional synchronization of host editor buffer content.
//!
//! An external control process uses this crate to read, decode, and rewrite
//! buffers owned by a host editor without disturbing the editor's own
//! bookkeeping:
//! * [`Buffers::decode`] / [`Buffers::assign`]: bytes to lines under the host's
//!   encoding and line-ending candidates
//! * [`Buffers::replace`] / [`Buffers::append`]: edits that relax the
//!   `modifiable` guard for exactly their duration
//! * [`Buffers::reload`] / [`Buffers::open`]: focus-preserving host commands
//! * [`Buffers::concrete`]: snapshots that survive reloads of file-less buffers
//! * [`ensure`] / [`with_modifiable`]: the scoped helpers the above build on
//!
//! Per-session host registrations live in a [`SessionRegistry`]; hooks call
//! back through [`Buffers::dispatch`].

#![warn(missing_docs)]

pub mod concrete;
pub mod config;
pub mod context;
mod dispatch;
pub mod error;
pub mod loader;
pub mod protocol;
pub mod session;

pub use bufsync_codec::FileFormat;
pub use bufsync_rpc::{Bufnr, WinId};
pub use concrete::ConcreteSnapshot;
pub use config::Config;
pub use context::{ensure, with_modifiable};
pub use error::{ConfigError, Error, Result};
pub use protocol::{AppendOptions, Buffers, DecodeOptions, Decoded, OpenOptions, OpenResult, ReplaceOptions};
pub use session::{RoutineKind, Routines, SessionId, SessionRegistry, SessionState};
