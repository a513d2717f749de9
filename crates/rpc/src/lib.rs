//! Collaborator interfaces between the buffer synchronization core and a host editor.
//!
//! This crate owns no transport. It defines what the core needs from one:
//! * [`Rpc`]: named host calls and host script commands
//! * [`Options`]: per-buffer and global option access
//! * [`Autocmd`]: named hook groups of (event, pattern, callback)
//! * [`Batch`]: ordered calls applied without foreign interleaving
//!
//! [`Host`] bundles all four. The `fake` feature provides [`fake::FakeHost`],
//! an in-memory host with windows, buffers, and hooks.

#![warn(missing_docs)]

pub mod error;
pub mod ids;
pub mod protocol;
pub mod value;

#[cfg(feature = "fake")]
pub mod fake;

pub use error::{HostError, HostResult};
pub use ids::{Bufnr, CounterIdGen, WinId};
pub use protocol::{Autocmd, Batch, Call, Callback, Hook, HookEvent, HookPattern, Host, Options, Rpc};
pub use serde_json::{Map as JsonMap, Value};
