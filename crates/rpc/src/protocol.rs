//! Collaborator traits a host editor transport implements.

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::{Bufnr, HostResult};

/// A single named host call, as submitted through [`Batch::batch`].
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
	/// Host function name.
	pub name: String,
	/// Positional arguments.
	pub args: Vec<Value>,
}

impl Call {
	/// Creates a call from a name and positional arguments.
	pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
		Self { name: name.into(), args }
	}
}

/// Named host calls and script commands.
#[async_trait]
pub trait Rpc: Send + Sync {
	/// Invokes host routine `name` and returns its result.
	async fn call(&self, name: &str, args: Vec<Value>) -> HostResult<Value>;

	/// Executes host script `text`, with optional `l:`-scoped locals.
	async fn command(&self, text: &str, locals: Option<Map<String, Value>>) -> HostResult<()>;
}

/// Per-buffer and global option access.
#[async_trait]
pub trait Options: Send + Sync {
	/// Reads buffer-local option `name` of `bufnr`.
	async fn buf_option(&self, bufnr: Bufnr, name: &str) -> HostResult<Value>;

	/// Writes buffer-local option `name` of `bufnr`.
	async fn set_buf_option(&self, bufnr: Bufnr, name: &str, value: Value) -> HostResult<()>;

	/// Reads global option `name`.
	async fn global_option(&self, name: &str) -> HostResult<Value>;
}

/// Host events the core subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HookEvent {
	/// A buffer became the current buffer of a window.
	BufEnter,
	/// A buffer is about to be read; the hook replaces the read.
	BufReadCmd,
	/// A buffer is about to be written; the hook replaces the write.
	BufWriteCmd,
	/// A user-defined event.
	User,
}

impl HookEvent {
	/// Host spelling of the event.
	pub const fn as_str(&self) -> &'static str {
		match self {
			HookEvent::BufEnter => "BufEnter",
			HookEvent::BufReadCmd => "BufReadCmd",
			HookEvent::BufWriteCmd => "BufWriteCmd",
			HookEvent::User => "User",
		}
	}
}

/// What a hook matches against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HookPattern {
	/// A single buffer, `<buffer=N>`.
	Buffer(Bufnr),
	/// A literal pattern, such as a user event name.
	Name(String),
}

impl fmt::Display for HookPattern {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			HookPattern::Buffer(bufnr) => write!(f, "<buffer={bufnr}>"),
			HookPattern::Name(name) => f.write_str(name),
		}
	}
}

/// What the host does when a hook fires.
#[derive(Debug, Clone, PartialEq)]
pub enum Callback {
	/// Invoke a session routine registered with the host.
	Routine {
		/// Registered routine name.
		name: String,
		/// Arguments bound when the hook was defined.
		args: Vec<Value>,
	},
	/// Run a host script command.
	Command(String),
}

/// One (event, pattern, callback) triplet of a hook group.
#[derive(Debug, Clone, PartialEq)]
pub struct Hook {
	/// Triggering event.
	pub event: HookEvent,
	/// Matched pattern.
	pub pattern: HookPattern,
	/// Action taken on firing.
	pub callback: Callback,
	/// Remove the hook after it fires once.
	pub once: bool,
	/// Allow the callback to trigger further hooks.
	pub nested: bool,
}

impl Hook {
	/// Creates a persistent, non-nested hook.
	pub fn new(event: HookEvent, pattern: HookPattern, callback: Callback) -> Self {
		Self {
			event,
			pattern,
			callback,
			once: false,
			nested: false,
		}
	}

	/// Marks the hook one-shot.
	#[must_use]
	pub fn once(mut self) -> Self {
		self.once = true;
		self
	}

	/// Marks the hook nested.
	#[must_use]
	pub fn nested(mut self) -> Self {
		self.nested = true;
		self
	}
}

/// Named hook groups.
#[async_trait]
pub trait Autocmd: Send + Sync {
	/// Defines `group` as exactly `hooks`, clearing any previous definitions.
	async fn define_group(&self, group: &str, hooks: Vec<Hook>) -> HostResult<()>;

	/// Removes every hook of `group`. Removing an unknown group is not an error.
	async fn remove_group(&self, group: &str) -> HostResult<()>;
}

/// Ordered calls applied without foreign interleaving.
#[async_trait]
pub trait Batch: Send + Sync {
	/// Submits `calls` together; results come back in call order.
	async fn batch(&self, calls: Vec<Call>) -> HostResult<Vec<Value>>;
}

/// Everything the core needs from a host editor.
pub trait Host: Rpc + Options + Autocmd + Batch {}

impl<T: Rpc + Options + Autocmd + Batch + ?Sized> Host for T {}
