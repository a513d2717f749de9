//! Process-wide record of host scripts already loaded.
//!
//! The set starts empty when the process starts, gains an identifier after
//! the first successful load, and is consulted before every load. It is never
//! cleared while the process runs.

use std::collections::HashSet;
use std::sync::LazyLock;

use bufsync_rpc::Rpc;
use tokio::sync::Mutex;

use crate::Result;

static LOADED: LazyLock<Mutex<HashSet<String>>> = LazyLock::new(|| Mutex::new(HashSet::new()));

/// Runs `command` on the host unless script `id` was loaded before.
///
/// Returns `true` when the command ran. A failed load is not recorded, so the
/// next call retries.
pub async fn load<H: Rpc + ?Sized>(host: &H, id: &str, command: &str) -> Result<bool> {
	let mut loaded = LOADED.lock().await;
	if loaded.contains(id) {
		return Ok(false);
	}
	host.command(command, None).await?;
	loaded.insert(id.to_string());
	tracing::debug!(id, "host script loaded");
	Ok(true)
}

/// Returns true if script `id` was loaded by this process.
pub async fn is_loaded(id: &str) -> bool {
	LOADED.lock().await.contains(id)
}
