//! Host-owned handles.
//!
//! Both handles are foreign keys: the host allocates and frees them, this
//! crate only carries them around.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque buffer handle owned by the host editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bufnr(pub i64);

impl fmt::Display for Bufnr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

/// Opaque window handle owned by the host editor.
///
/// The host reports `-1` for "no such window"; see [`WinId::is_none`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WinId(pub i64);

impl WinId {
	/// Sentinel the host uses for "not displayed".
	pub const NONE: WinId = WinId(-1);

	/// Returns true for the "not displayed" sentinel.
	pub const fn is_none(self) -> bool {
		self.0 == Self::NONE.0
	}
}

impl fmt::Display for WinId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

/// Simple counter-based ID generator.
#[derive(Debug, Clone, Copy)]
pub struct CounterIdGen(pub i64);

impl Default for CounterIdGen {
	fn default() -> Self {
		Self::new(1)
	}
}

impl CounterIdGen {
	/// Creates a new counter starting at `first`.
	#[must_use]
	pub const fn new(first: i64) -> Self {
		Self(first)
	}

	/// Generates the next unique ID and increments the counter.
	#[allow(clippy::should_implement_trait, reason = "convention")]
	pub fn next(&mut self) -> i64 {
		let id = self.0;
		self.0 += 1;
		id
	}
}
