//! Buffer mutation protocol.
//!
//! Every mutation runs inside [`with_modifiable`], so editor guards are
//! relaxed for exactly the duration of the edit and the buffer's `modified`
//! and `modifiable` flags read the same afterwards as before.

use std::sync::Arc;

use bufsync_codec::{FileFormat, UnsupportedFormat, detect, parse_list, prioritize_dos, split};
use bufsync_rpc::value::{as_lines, as_string};
use bufsync_rpc::{Bufnr, Call, Callback, Hook, HookEvent, HookPattern, Host, Value, WinId};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::context::{current_bufnr_call, ensure, finish, goto, int, three, with_manual_folds, with_modifiable};
use crate::session::{RoutineKind, SessionId, SessionRegistry, SessionState};
use crate::{Error, Result};

/// How [`Buffers::open`] opens its target.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
	/// Append `!` to the opener.
	pub bang: bool,
	/// Command modifiers placed before the opener, e.g. `belowright`.
	pub mods: String,
	/// Extra `++opt` arguments, e.g. `++enc=utf-8`.
	pub cmdarg: String,
	/// Opener command, e.g. `edit`, `split`, `tabedit`.
	pub opener: String,
}

impl Default for OpenOptions {
	fn default() -> Self {
		Self {
			bang: false,
			mods: String::new(),
			cmdarg: String::new(),
			opener: "edit".into(),
		}
	}
}

impl OpenOptions {
	fn command_line(&self, escaped_target: &str) -> String {
		let opener = if self.bang { format!("{}!", self.opener) } else { self.opener.clone() };
		[self.mods.as_str(), opener.as_str(), self.cmdarg.as_str(), escaped_target]
			.into_iter()
			.filter(|part| !part.is_empty())
			.collect::<Vec<_>>()
			.join(" ")
	}
}

/// Where [`Buffers::open`] landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OpenResult {
	/// Window showing the target.
	pub winid: WinId,
	/// Buffer holding the target.
	pub bufnr: Bufnr,
	/// Window number within its tab page.
	pub winnr: i64,
	/// Tab page number.
	pub tabpagenr: i64,
}

/// Insertion point of [`Buffers::append`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendOptions {
	/// Insert below this line; `0` inserts at the top. Defaults to the cursor line.
	pub lnum: Option<i64>,
}

/// Metadata [`Buffers::replace`] sets along with the content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceOptions {
	/// New `fileformat`.
	pub fileformat: Option<FileFormat>,
	/// New `fileencoding`.
	pub fileencoding: Option<String>,
}

/// Overrides for [`Buffers::decode`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeOptions {
	/// Use this format instead of detecting one.
	pub fileformat: Option<FileFormat>,
	/// Use only this encoding instead of the host's candidate list.
	pub fileencoding: Option<String>,
}

/// Bytes decoded into buffer-ready lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
	/// Buffer lines.
	pub content: Vec<String>,
	/// Line-ending convention used to split.
	pub fileformat: FileFormat,
	/// Encoding label that decoded the bytes.
	pub fileencoding: String,
}

/// Buffer operations of one session against one host.
pub struct Buffers<H> {
	host: H,
	session: SessionId,
	registry: Arc<SessionRegistry>,
}

impl<H> std::fmt::Debug for Buffers<H> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Buffers")
			.field("session", &self.session)
			.finish_non_exhaustive()
	}
}

impl<H: Host> Buffers<H> {
	/// Creates the operations of `session`, memoized in the process-wide registry.
	pub fn new(host: H, session: SessionId) -> Self {
		Self::with_registry(host, session, SessionRegistry::global())
	}

	/// Creates the operations of `session`, memoized in `registry`.
	pub fn with_registry(host: H, session: SessionId, registry: Arc<SessionRegistry>) -> Self {
		Self { host, session, registry }
	}

	/// The host collaborator.
	pub fn host(&self) -> &H {
		&self.host
	}

	/// The session identity.
	pub fn session(&self) -> &SessionId {
		&self.session
	}

	/// The registry memoizing this session.
	pub fn registry(&self) -> &Arc<SessionRegistry> {
		&self.registry
	}

	/// Establishes the session on first use and returns its state.
	pub async fn state(&self) -> Result<Arc<SessionState>> {
		self.registry.ensure(&self.host, &self.session).await
	}

	/// Ends the session, releasing its routines, hooks, and snapshots.
	pub async fn teardown(&self) -> Result<()> {
		self.registry.teardown(&self.host, &self.session).await
	}

	/// Opens `target` and reports the window and buffer it landed in.
	pub async fn open(&self, target: &str, options: &OpenOptions) -> Result<OpenResult> {
		self.state().await?;
		let escaped = self.host.call("fnameescape", vec![json!(target)]).await?;
		let escaped = as_string(&escaped).ok_or_else(|| Error::unexpected("fnameescape", escaped))?;
		self.host.command(&options.command_line(&escaped), None).await?;

		let results = self
			.host
			.batch(vec![
				Call::new("win_getid", Vec::new()),
				current_bufnr_call(),
				Call::new("winnr", Vec::new()),
				Call::new("tabpagenr", Vec::new()),
			])
			.await?;
		let [winid, bufnr, winnr, tabpagenr] =
			<[Value; 4]>::try_from(results).map_err(|r| Error::unexpected("batch results", Value::Array(r)))?;
		let opened = OpenResult {
			winid: WinId(int("win_getid", &winid)?),
			bufnr: Bufnr(int("bufnr", &bufnr)?),
			winnr: int("winnr", &winnr)?,
			tabpagenr: int("tabpagenr", &tabpagenr)?,
		};
		tracing::debug!(target, bufnr = %opened.bufnr, winid = %opened.winid, "opened");
		Ok(opened)
	}

	/// Reloads `bufnr` from its source.
	///
	/// A buffer that is current or shown in some window reloads now. A hidden
	/// buffer reloads the next time it is entered, at most once; this call
	/// returns without waiting for that.
	pub async fn reload(&self, bufnr: Bufnr) -> Result<()> {
		let state = self.state().await?;
		if state.take_reload_pending(bufnr) {
			self.cancel_deferred_reload(&state, bufnr).await?;
		}
		if self.reload_visible(bufnr).await? {
			return Ok(());
		}

		let group = state.reload_group(bufnr);
		let hook = Hook::new(
			HookEvent::BufEnter,
			HookPattern::Buffer(bufnr),
			state.routines().callback(RoutineKind::DeferredReload, bufnr),
		)
		.once()
		.nested();
		self.host.define_group(&group, vec![hook]).await?;
		state.track_group(group);
		state.mark_reload_pending(bufnr);
		tracing::debug!(%bufnr, "reload deferred until buffer is entered");
		Ok(())
	}

	/// Runs a reload deferred by [`Buffers::reload`]; later firings are no-ops.
	pub(crate) async fn deferred_reload(&self, bufnr: Bufnr) -> Result<()> {
		let state = self.state().await?;
		if !state.take_reload_pending(bufnr) {
			tracing::debug!(%bufnr, "deferred reload already ran");
			return Ok(());
		}
		self.cancel_deferred_reload(&state, bufnr).await?;
		if !self.reload_visible(bufnr).await? {
			tracing::debug!(%bufnr, "deferred reload fired for a buffer no longer visible");
		}
		Ok(())
	}

	async fn cancel_deferred_reload(&self, state: &SessionState, bufnr: Bufnr) -> Result<()> {
		let group = state.reload_group(bufnr);
		state.untrack_group(&group);
		self.host.remove_group(&group).await?;
		Ok(())
	}

	/// Reloads `bufnr` if it is current or shown; returns false otherwise.
	async fn reload_visible(&self, bufnr: Bufnr) -> Result<bool> {
		let results = self
			.host
			.batch(vec![
				current_bufnr_call(),
				Call::new("win_getid", Vec::new()),
				Call::new("win_findbuf", vec![json!(bufnr)]),
			])
			.await?;
		let [current, winid, windows] = three(results)?;

		if Bufnr(int("bufnr", &current)?) == bufnr {
			self.edit().await?;
			return Ok(true);
		}

		let windows: Vec<WinId> =
			serde_json::from_value(windows.clone()).map_err(|_| Error::unexpected("win_findbuf", windows))?;
		let Some(&target) = windows.first() else {
			return Ok(false);
		};

		let saved = WinId(int("win_getid", &winid)?);
		goto(&self.host, target).await?;
		let outcome = self.edit().await;
		let restored = goto(&self.host, saved).await;
		finish(outcome, restored)?;
		Ok(true)
	}

	async fn edit(&self) -> Result<()> {
		self.host.command("edit", None).await?;
		Ok(())
	}

	/// Inserts `lines` below `options.lnum`, or below the cursor line of
	/// `bufnr` when no line is given.
	///
	/// The `modified` flag reads the same afterwards as before the call.
	pub async fn append<S: AsRef<str>>(&self, bufnr: Bufnr, lines: &[S], options: AppendOptions) -> Result<()> {
		self.state().await?;
		let lnum = match options.lnum {
			Some(lnum) => lnum,
			None => {
				ensure(&self.host, bufnr, async || -> Result<i64> {
					let line = self.host.call("line", vec![json!(".")]).await?;
					int("line", &line)
				})
				.await?
			}
		};
		let lines = to_json_lines(lines);

		with_modifiable(&self.host, bufnr, async || -> Result<()> {
			with_manual_folds(&self.host, bufnr, async || -> Result<()> {
				self.host.call("appendbufline", vec![json!(bufnr), json!(lnum), lines]).await?;
				Ok(())
			})
			.await
		})
		.await?;
		tracing::debug!(%bufnr, lnum, "appended");
		Ok(())
	}

	/// Overwrites the whole content of `bufnr` with `lines`.
	pub async fn replace<S: AsRef<str>>(&self, bufnr: Bufnr, lines: &[S], options: &ReplaceOptions) -> Result<()> {
		self.state().await?;
		self.replace_content(bufnr, lines, options).await
	}

	pub(crate) async fn replace_content<S: AsRef<str>>(
		&self,
		bufnr: Bufnr,
		lines: &[S],
		options: &ReplaceOptions,
	) -> Result<()> {
		let count = lines.len();
		let lines = to_json_lines(lines);

		with_modifiable(&self.host, bufnr, async || -> Result<()> {
			with_manual_folds(&self.host, bufnr, async || -> Result<()> {
				if let Some(fileformat) = options.fileformat {
					self.host.set_buf_option(bufnr, "fileformat", json!(fileformat.as_str())).await?;
				}
				if let Some(fileencoding) = &options.fileencoding {
					self.host.set_buf_option(bufnr, "fileencoding", json!(fileencoding)).await?;
				}
				self.host.call("setbufline", vec![json!(bufnr), json!(1), lines]).await?;
				self.host.call("deletebufline", vec![json!(bufnr), json!(count + 1), json!("$")]).await?;
				Ok(())
			})
			.await
		})
		.await?;
		tracing::debug!(%bufnr, lines = count, "replaced");
		Ok(())
	}

	/// Decodes `bytes` into lines for `bufnr` the way the host would read them.
	///
	/// Encoding candidates come from the global `fileencodings`, format
	/// candidates from `fileformats` with `dos` tested before `unix`. Content
	/// with no line ending keeps the buffer's current `fileformat`.
	pub async fn decode(&self, bufnr: Bufnr, bytes: &[u8], options: &DecodeOptions) -> Result<Decoded> {
		let encodings = match &options.fileencoding {
			Some(fileencoding) => vec![fileencoding.clone()],
			None => {
				let value = self.host.global_option("fileencodings").await?;
				let list = as_string(&value).ok_or_else(|| Error::unexpected("fileencodings", value))?;
				list.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
			}
		};
		let decoded = bufsync_codec::decode(bytes, &encodings);

		let fileformat = match options.fileformat {
			Some(fileformat) => fileformat,
			None => {
				let value = self.host.global_option("fileformats").await?;
				let list = as_string(&value).ok_or_else(|| Error::unexpected("fileformats", value))?;
				let candidates = prioritize_dos(&parse_list(&list)?);
				match detect(&decoded.text, &candidates) {
					Some(fileformat) => fileformat,
					None => self.current_fileformat(bufnr).await?,
				}
			}
		};

		tracing::debug!(%bufnr, %fileformat, fileencoding = decoded.encoding.as_str(), "decoded");
		Ok(Decoded {
			content: split(&decoded.text, fileformat),
			fileformat,
			fileencoding: decoded.encoding,
		})
	}

	async fn current_fileformat(&self, bufnr: Bufnr) -> Result<FileFormat> {
		let value = self.host.buf_option(bufnr, "fileformat").await?;
		let name = as_string(&value).ok_or_else(|| Error::unexpected("fileformat", value))?;
		if name.is_empty() {
			return Err(UnsupportedFormat(name).into());
		}
		Ok(name.parse()?)
	}

	/// Decodes `bytes` and replaces the content of `bufnr` with the result,
	/// recording the detected `fileformat` and `fileencoding`.
	pub async fn assign(&self, bufnr: Bufnr, bytes: &[u8], options: &DecodeOptions) -> Result<Decoded> {
		let decoded = self.decode(bufnr, bytes, options).await?;
		let replace = ReplaceOptions {
			fileformat: Some(decoded.fileformat),
			fileencoding: Some(decoded.fileencoding.clone()),
		};
		self.replace(bufnr, &decoded.content, &replace).await?;
		Ok(decoded)
	}

	/// Runs `action` with `bufnr` as the current buffer; see [`crate::ensure`].
	pub async fn ensure<T, F>(&self, bufnr: Bufnr, action: F) -> Result<T>
	where
		F: AsyncFnOnce() -> Result<T>,
	{
		ensure(&self.host, bufnr, action).await
	}

	/// Runs `action` with `bufnr` forced modifiable; see [`crate::with_modifiable`].
	pub async fn with_modifiable<T, F>(&self, bufnr: Bufnr, action: F) -> Result<T>
	where
		F: AsyncFnOnce() -> Result<T>,
	{
		with_modifiable(&self.host, bufnr, action).await
	}

	/// Delivers a fired hook callback to this session.
	///
	/// Routine callbacks go through [`Buffers::dispatch`]; command callbacks
	/// run on the host.
	pub async fn deliver(&self, callback: Callback) -> Result<Value> {
		match callback {
			Callback::Routine { name, args } => self.dispatch(&name, args).await,
			Callback::Command(text) => {
				self.host.command(&text, None).await?;
				Ok(Value::Null)
			}
		}
	}
}

pub(crate) fn lines_arg(routine: &str, value: Option<&Value>) -> Result<Vec<String>> {
	value
		.and_then(as_lines)
		.ok_or_else(|| Error::invalid_args(routine, "expected a list of lines"))
}

fn to_json_lines<S: AsRef<str>>(lines: &[S]) -> Value {
	Value::Array(lines.iter().map(|line| Value::from(line.as_ref())).collect())
}
