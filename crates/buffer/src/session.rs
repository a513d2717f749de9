//! Per-session routine registration and state.
//!
//! Several extension sessions can drive the same host at once, so every
//! host-visible name a session creates carries a suffix generated on first
//! use. [`SessionRegistry::ensure`] performs that first-use registration once
//! and memoizes the resulting [`SessionState`] by [`SessionId`].

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, LazyLock};

use bufsync_rpc::{Bufnr, Callback, Hook, HookEvent, HookPattern, Host, JsonMap, Value};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::concrete::ConcreteSnapshot;
use crate::context::finish;
use crate::{Config, Result, loader};

/// Fixed host command defining a forwarder for one routine.
const DEFINE_ROUTINE: &str = "call bufsync#define(l:name, l:session)";

/// Fixed host command removing a forwarder.
const UNDEFINE_ROUTINE: &str = "call bufsync#undefine(l:name)";

static GLOBAL: LazyLock<Arc<SessionRegistry>> = LazyLock::new(|| Arc::new(SessionRegistry::new(Config::default())));

/// Identity of one running extension session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
	/// Creates an identifier from the session's name.
	pub fn new(name: impl Into<String>) -> Self {
		Self(name.into())
	}

	/// Returns the name.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Behaviours a session exposes to the host under registered names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutineKind {
	/// Open a target via an opener command.
	Open,
	/// Reload a buffer.
	Reload,
	/// Insert lines into a buffer.
	Append,
	/// Overwrite buffer content.
	Replace,
	/// Snapshot a buffer on write.
	ConcreteStore,
	/// Restore a buffer's snapshot on read.
	ConcreteRestore,
	/// Run a reload deferred until the buffer is entered.
	DeferredReload,
	/// Tear the session down.
	Teardown,
}

impl RoutineKind {
	/// Every kind, in registration order.
	pub const ALL: [RoutineKind; 8] = [
		RoutineKind::Open,
		RoutineKind::Reload,
		RoutineKind::Append,
		RoutineKind::Replace,
		RoutineKind::ConcreteStore,
		RoutineKind::ConcreteRestore,
		RoutineKind::DeferredReload,
		RoutineKind::Teardown,
	];

	const fn index(self) -> usize {
		self as usize
	}

	const fn stem(self) -> &'static str {
		match self {
			RoutineKind::Open => "Open",
			RoutineKind::Reload => "Reload",
			RoutineKind::Append => "Append",
			RoutineKind::Replace => "Replace",
			RoutineKind::ConcreteStore => "ConcreteStore",
			RoutineKind::ConcreteRestore => "ConcreteRestore",
			RoutineKind::DeferredReload => "DeferredReload",
			RoutineKind::Teardown => "Teardown",
		}
	}
}

/// Registered routine names of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routines {
	names: [String; RoutineKind::ALL.len()],
}

impl Routines {
	fn new(prefix: &str, suffix: &str) -> Self {
		Self {
			names: RoutineKind::ALL.map(|kind| format!("{prefix}{}_{suffix}", kind.stem())),
		}
	}

	/// Registered name of `kind`.
	pub fn name(&self, kind: RoutineKind) -> &str {
		&self.names[kind.index()]
	}

	/// Kind registered under `name`.
	pub fn kind_of(&self, name: &str) -> Option<RoutineKind> {
		RoutineKind::ALL.into_iter().find(|kind| self.name(*kind) == name)
	}

	/// Iterates `(kind, name)` pairs in registration order.
	pub fn iter(&self) -> impl Iterator<Item = (RoutineKind, &str)> {
		RoutineKind::ALL.into_iter().map(move |kind| (kind, self.name(kind)))
	}

	/// Hook callback invoking `kind` for `bufnr`.
	pub(crate) fn callback(&self, kind: RoutineKind, bufnr: Bufnr) -> Callback {
		Callback::Routine {
			name: self.name(kind).to_string(),
			args: vec![Value::from(bufnr.0)],
		}
	}
}

/// State owned by one session from first use until teardown.
#[derive(Debug)]
pub struct SessionState {
	session: SessionId,
	suffix: String,
	group_prefix: String,
	routines: Routines,
	snapshots: Mutex<HashMap<Bufnr, ConcreteSnapshot>>,
	groups: Mutex<BTreeSet<String>>,
	pending_reloads: Mutex<HashSet<Bufnr>>,
}

impl SessionState {
	fn new(session: SessionId, suffix: String, config: &Config) -> Self {
		Self {
			routines: Routines::new(&config.routine_prefix, &suffix),
			group_prefix: config.group_prefix.clone(),
			session,
			suffix,
			snapshots: Mutex::new(HashMap::new()),
			groups: Mutex::new(BTreeSet::new()),
			pending_reloads: Mutex::new(HashSet::new()),
		}
	}

	/// Session this state belongs to.
	pub fn session(&self) -> &SessionId {
		&self.session
	}

	/// Unique suffix of every host-visible name this session creates.
	pub fn suffix(&self) -> &str {
		&self.suffix
	}

	/// Registered routine names.
	pub fn routines(&self) -> &Routines {
		&self.routines
	}

	/// Hook groups currently owned by the session.
	pub fn groups(&self) -> Vec<String> {
		self.groups.lock().iter().cloned().collect()
	}

	/// Latest snapshot of `bufnr`, if any.
	pub fn snapshot(&self, bufnr: Bufnr) -> Option<ConcreteSnapshot> {
		self.snapshots.lock().get(&bufnr).cloned()
	}

	/// Returns true if a deferred reload of `bufnr` has not run yet.
	pub fn is_reload_pending(&self, bufnr: Bufnr) -> bool {
		self.pending_reloads.lock().contains(&bufnr)
	}

	pub(crate) fn session_group(&self) -> String {
		format!("{}_session_{}", self.group_prefix, self.suffix)
	}

	pub(crate) fn concrete_group(&self, bufnr: Bufnr) -> String {
		format!("{}_concrete_{}_{bufnr}", self.group_prefix, self.suffix)
	}

	pub(crate) fn reload_group(&self, bufnr: Bufnr) -> String {
		format!("{}_reload_{}_{bufnr}", self.group_prefix, self.suffix)
	}

	pub(crate) fn track_group(&self, group: String) {
		self.groups.lock().insert(group);
	}

	pub(crate) fn untrack_group(&self, group: &str) {
		self.groups.lock().remove(group);
	}

	pub(crate) fn store_snapshot(&self, bufnr: Bufnr, snapshot: ConcreteSnapshot) {
		self.snapshots.lock().insert(bufnr, snapshot);
	}

	pub(crate) fn mark_reload_pending(&self, bufnr: Bufnr) {
		self.pending_reloads.lock().insert(bufnr);
	}

	/// Clears the pending mark, returning whether it was set.
	pub(crate) fn take_reload_pending(&self, bufnr: Bufnr) -> bool {
		self.pending_reloads.lock().remove(&bufnr)
	}

	fn clear(&self) -> Vec<String> {
		self.snapshots.lock().clear();
		self.pending_reloads.lock().clear();
		std::mem::take(&mut *self.groups.lock()).into_iter().collect()
	}
}

/// Memoized session states keyed by [`SessionId`].
#[derive(Debug)]
pub struct SessionRegistry {
	config: Config,
	sessions: Mutex<HashMap<SessionId, Arc<SessionState>>>,
	init: tokio::sync::Mutex<()>,
}

impl SessionRegistry {
	/// Creates an empty registry.
	pub fn new(config: Config) -> Self {
		Self {
			config,
			sessions: Mutex::new(HashMap::new()),
			init: tokio::sync::Mutex::new(()),
		}
	}

	/// Process-wide registry with default configuration.
	pub fn global() -> Arc<SessionRegistry> {
		GLOBAL.clone()
	}

	/// Settings shared by every session.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Returns the state of `session` if it was established.
	pub fn get(&self, session: &SessionId) -> Option<Arc<SessionState>> {
		self.sessions.lock().get(session).cloned()
	}

	/// Establishes `session` on first call and returns its memoized state.
	///
	/// The first call generates the suffix, loads the host forwarding shim,
	/// registers every routine, and installs the termination hook. Later calls
	/// touch neither the host nor the state.
	///
	/// A failed first call releases whatever it had already registered and
	/// memoizes nothing, so a retry starts clean.
	pub async fn ensure<H: Host + ?Sized>(&self, host: &H, session: &SessionId) -> Result<Arc<SessionState>> {
		if let Some(state) = self.get(session) {
			return Ok(state);
		}
		let _init = self.init.lock().await;
		if let Some(state) = self.get(session) {
			return Ok(state);
		}

		let suffix = Uuid::new_v4().simple().to_string();
		let state = Arc::new(SessionState::new(session.clone(), suffix, &self.config));

		let mut defined = 0;
		if let Err(err) = self.register(host, session, &state, &mut defined).await {
			tracing::debug!(session = %session, defined, error = %err, "session registration failed");
			let names: Vec<&str> = state.routines.iter().take(defined).map(|(_, name)| name).collect();
			let released = release(host, session, &state.clear(), &names).await;
			return finish(Err(err), released);
		}

		self.sessions.lock().insert(session.clone(), state.clone());
		tracing::debug!(session = %session, suffix = state.suffix(), "session established");
		Ok(state)
	}

	/// Host side of [`SessionRegistry::ensure`]. `defined` counts the routines
	/// already registered so a failure can release exactly those.
	async fn register<H: Host + ?Sized>(
		&self,
		host: &H,
		session: &SessionId,
		state: &SessionState,
		defined: &mut usize,
	) -> Result<()> {
		let script = &self.config.dispatch_script;
		loader::load(host, script, script).await?;
		for (_, name) in state.routines.iter() {
			host.command(DEFINE_ROUTINE, Some(locals(name, session))).await?;
			*defined += 1;
		}

		let group = state.session_group();
		let teardown = Hook::new(
			HookEvent::User,
			HookPattern::Name(format!("{}:{session}", self.config.teardown_event)),
			Callback::Routine {
				name: state.routines.name(RoutineKind::Teardown).to_string(),
				args: Vec::new(),
			},
		)
		.once();
		host.define_group(&group, vec![teardown]).await?;
		state.track_group(group);
		Ok(())
	}

	/// Releases everything `session` registered with the host.
	///
	/// Every owned hook group and routine is removed even if some removals
	/// fail; the first failure is returned afterwards. Unknown sessions are a
	/// no-op.
	pub async fn teardown<H: Host + ?Sized>(&self, host: &H, session: &SessionId) -> Result<()> {
		let Some(state) = self.sessions.lock().remove(session) else {
			return Ok(());
		};
		let groups = state.clear();
		let names: Vec<&str> = state.routines.iter().map(|(_, name)| name).collect();
		let released = release(host, session, &groups, &names).await;
		tracing::debug!(session = %session, groups = groups.len(), "session torn down");
		released
	}
}

/// Removes `groups` and undefines `names`, attempting every removal before
/// reporting the first failure.
async fn release<H: Host + ?Sized>(host: &H, session: &SessionId, groups: &[String], names: &[&str]) -> Result<()> {
	let mut first_error = None;
	for group in groups {
		if let Err(err) = host.remove_group(group).await {
			first_error.get_or_insert(err);
		}
	}
	for name in names {
		if let Err(err) = host.command(UNDEFINE_ROUTINE, Some(locals(name, session))).await {
			first_error.get_or_insert(err);
		}
	}
	match first_error {
		Some(err) => Err(err.into()),
		None => Ok(()),
	}
}

fn locals(name: &str, session: &SessionId) -> JsonMap<String, Value> {
	let mut locals = JsonMap::new();
	locals.insert("name".into(), Value::from(name));
	locals.insert("session".into(), Value::from(session.as_str()));
	locals
}

#[cfg(test)]
mod tests;
