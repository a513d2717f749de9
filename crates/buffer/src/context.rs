//! Scoped execution with guaranteed restoration.
//!
//! Each helper captures state on entry, runs the action, and restores what it
//! captured on every exit path. Restoration uses only values captured at that
//! helper's own entry, so nested helpers compose.
//!
//! If the transport dies while an action is suspended, or the returned future
//! is dropped before completion, the restoration step cannot run.

use bufsync_rpc::value::as_int;
use bufsync_rpc::{Bufnr, Call, Host, Value, WinId};
use serde_json::json;

use crate::{Error, Result};

/// Runs `action` with `bufnr` as the current buffer.
///
/// If `bufnr` is already current the action runs in place. If it is shown in
/// a window of the current tab page, that window is focused for the duration.
/// Otherwise the current window displays `bufnr` for the duration. Focus or
/// the displayed buffer is switched back even when the action fails.
pub async fn ensure<H, T, F>(host: &H, bufnr: Bufnr, action: F) -> Result<T>
where
	H: Host + ?Sized,
	F: AsyncFnOnce() -> Result<T>,
{
	let results = host
		.batch(vec![
			current_bufnr_call(),
			Call::new("win_getid", Vec::new()),
			Call::new("bufwinid", vec![json!(bufnr)]),
		])
		.await?;
	let [current, winid, target] = three(results)?;
	let current = Bufnr(int("bufnr", &current)?);
	let winid = WinId(int("win_getid", &winid)?);
	let target = WinId(int("bufwinid", &target)?);

	if current == bufnr {
		return action().await;
	}

	if target.is_none() {
		tracing::trace!(%bufnr, %current, "displaying buffer in current window");
		switch_buffer(host, bufnr).await?;
		let outcome = action().await;
		let restored = switch_buffer(host, current).await;
		return finish(outcome, restored);
	}

	tracing::trace!(%bufnr, %target, "focusing window of buffer");
	goto(host, target).await?;
	let outcome = action().await;
	let restored = goto(host, winid).await;
	finish(outcome, restored)
}

/// Runs `action` with `bufnr` forced modifiable.
///
/// The `modified` and `modifiable` flags are captured on entry and written
/// back afterwards regardless of the action's outcome.
pub async fn with_modifiable<H, T, F>(host: &H, bufnr: Bufnr, action: F) -> Result<T>
where
	H: Host + ?Sized,
	F: AsyncFnOnce() -> Result<T>,
{
	let guard = OptionGuard::capture(host, bufnr, &["modified", "modifiable"]).await?;
	host.set_buf_option(bufnr, "modifiable", json!(1)).await?;
	let outcome = action().await;
	let restored = guard.restore(host).await;
	finish(outcome, restored)
}

/// Runs `action` with `foldmethod` set to `manual` so line edits don't
/// recompute folds.
///
/// `foldmethod` is window-local. A buffer-scoped write reaches only the one
/// window the host picks for `bufnr` (a scratch window when it is hidden), so
/// other windows showing the buffer keep their folding during the edit. The
/// buffer is not switched into view for this, since switching away from a
/// modified current buffer can itself fail.
pub(crate) async fn with_manual_folds<H, T, F>(host: &H, bufnr: Bufnr, action: F) -> Result<T>
where
	H: Host + ?Sized,
	F: AsyncFnOnce() -> Result<T>,
{
	let guard = OptionGuard::capture(host, bufnr, &["foldmethod"]).await?;
	host.set_buf_option(bufnr, "foldmethod", json!("manual")).await?;
	let outcome = action().await;
	let restored = guard.restore(host).await;
	finish(outcome, restored)
}

/// Buffer option values captured at one point in time.
#[derive(Debug)]
pub(crate) struct OptionGuard {
	bufnr: Bufnr,
	saved: Vec<(&'static str, Value)>,
}

impl OptionGuard {
	pub(crate) async fn capture<H: Host + ?Sized>(host: &H, bufnr: Bufnr, names: &[&'static str]) -> Result<Self> {
		let mut saved = Vec::with_capacity(names.len());
		for name in names {
			saved.push((*name, host.buf_option(bufnr, name).await?));
		}
		Ok(Self { bufnr, saved })
	}

	/// Writes back every captured value, attempting all of them before
	/// reporting the first failure.
	pub(crate) async fn restore<H: Host + ?Sized>(self, host: &H) -> Result<()> {
		let mut first_error = None;
		for (name, value) in self.saved {
			if let Err(err) = host.set_buf_option(self.bufnr, name, value).await {
				first_error.get_or_insert(err);
			}
		}
		match first_error {
			Some(err) => Err(err.into()),
			None => Ok(()),
		}
	}
}

/// Combines an action's outcome with its restoration step.
///
/// A restoration failure is never swallowed: it replaces a successful
/// outcome, and wraps a failed one.
pub(crate) fn finish<T>(outcome: Result<T>, restored: Result<()>) -> Result<T> {
	let Err(restore) = restored else {
		return outcome;
	};
	tracing::warn!(error = %restore, "restoration failed");
	Err(Error::Restore {
		source: Box::new(restore),
		primary: outcome.err().map(Box::new),
	})
}

pub(crate) fn current_bufnr_call() -> Call {
	Call::new("bufnr", vec![json!("%")])
}

pub(crate) async fn goto<H: Host + ?Sized>(host: &H, winid: WinId) -> Result<()> {
	let moved = host.call("win_gotoid", vec![json!(winid)]).await?;
	match as_int(&moved) {
		Some(0) => Err(Error::NoWindow(winid)),
		Some(_) => Ok(()),
		None => Err(Error::unexpected("win_gotoid", moved)),
	}
}

async fn switch_buffer<H: Host + ?Sized>(host: &H, bufnr: Bufnr) -> Result<()> {
	host.command(&format!("noautocmd keepjumps keepalt {bufnr}buffer"), None).await?;
	Ok(())
}

pub(crate) fn int(what: &'static str, value: &Value) -> Result<i64> {
	as_int(value).ok_or_else(|| Error::unexpected(what, value.clone()))
}

pub(crate) fn three(results: Vec<Value>) -> Result<[Value; 3]> {
	<[Value; 3]>::try_from(results).map_err(|results| Error::unexpected("batch results", Value::Array(results)))
}

#[cfg(test)]
mod tests;
