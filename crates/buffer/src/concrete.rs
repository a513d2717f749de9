//! Snapshots that survive content-discarding reloads.
//!
//! A buffer with no backing file loses its content when the host reloads it.
//! [`Buffers::concrete`] takes over the buffer's write and read events: a
//! write snapshots the content into the session, and a read puts the latest
//! snapshot back.

use bufsync_rpc::value::{as_lines, as_string};
use bufsync_rpc::{Bufnr, Hook, HookEvent, HookPattern, Host};
use serde_json::json;

use crate::protocol::{Buffers, ReplaceOptions};
use crate::session::{RoutineKind, SessionState};
use crate::{Error, Result};

/// Content and file type of a buffer at its most recent write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcreteSnapshot {
	/// Value of `filetype`.
	pub filetype: String,
	/// Buffer lines.
	pub content: Vec<String>,
}

impl<H: Host> Buffers<H> {
	/// Makes `bufnr` survive reloads and snapshots its current content.
	///
	/// Calling this again replaces the previous hooks for `bufnr`.
	pub async fn concrete(&self, bufnr: Bufnr) -> Result<()> {
		let state = self.state().await?;
		let routines = state.routines();
		let group = state.concrete_group(bufnr);
		let hooks = vec![
			Hook::new(
				HookEvent::BufWriteCmd,
				HookPattern::Buffer(bufnr),
				routines.callback(RoutineKind::ConcreteStore, bufnr),
			)
			.nested(),
			Hook::new(
				HookEvent::BufReadCmd,
				HookPattern::Buffer(bufnr),
				routines.callback(RoutineKind::ConcreteRestore, bufnr),
			)
			.nested(),
		];
		self.host().define_group(&group, hooks).await?;
		state.track_group(group);
		self.snapshot(&state, bufnr).await
	}

	/// Write hook: the snapshot absorbs the write, so the buffer is no longer modified.
	pub(crate) async fn concrete_store(&self, bufnr: Bufnr) -> Result<()> {
		let state = self.state().await?;
		self.snapshot(&state, bufnr).await?;
		self.host().set_buf_option(bufnr, "modified", json!(0)).await?;
		Ok(())
	}

	/// Read hook: puts the latest snapshot back, if there is one.
	pub(crate) async fn concrete_restore(&self, bufnr: Bufnr) -> Result<()> {
		let state = self.state().await?;
		let Some(snapshot) = state.snapshot(bufnr) else {
			tracing::debug!(%bufnr, "no snapshot to restore");
			return Ok(());
		};
		self.replace_content(bufnr, &snapshot.content, &ReplaceOptions::default()).await?;
		self.host().set_buf_option(bufnr, "filetype", json!(snapshot.filetype)).await?;
		tracing::debug!(%bufnr, lines = snapshot.content.len(), "snapshot restored");
		Ok(())
	}

	async fn snapshot(&self, state: &SessionState, bufnr: Bufnr) -> Result<()> {
		let content = self
			.host()
			.call("getbufline", vec![json!(bufnr), json!(1), json!("$")])
			.await?;
		let content = as_lines(&content).ok_or_else(|| Error::unexpected("getbufline", content))?;
		let filetype = self.host().buf_option(bufnr, "filetype").await?;
		let filetype = as_string(&filetype).ok_or_else(|| Error::unexpected("filetype", filetype))?;
		tracing::debug!(%bufnr, lines = content.len(), "snapshot stored");
		state.store_snapshot(bufnr, ConcreteSnapshot { filetype, content });
		Ok(())
	}
}
