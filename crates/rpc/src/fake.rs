//! In-memory host editor.
//!
//! [`FakeHost`] models just enough of an editor to exercise the buffer
//! protocol offline: buffers with options and an optional backing file,
//! windows across tab pages, hook groups, and a log of every call. Hooks do
//! not call back on their own; fired callbacks queue up in
//! [`FakeHost::take_fired`] for the test to deliver.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};

use crate::value::{as_int, as_lines, as_string};
use crate::{
	Autocmd, Batch, Bufnr, Call, Callback, CounterIdGen, Hook, HookEvent, HookPattern, HostError,
	HostResult, Options, Rpc, WinId,
};

/// Command modifiers the fake understands and skips.
const MODIFIERS: &[&str] = &[
	"noautocmd",
	"keepjumps",
	"keepalt",
	"silent",
	"silent!",
	"aboveleft",
	"belowright",
	"topleft",
	"botright",
	"vertical",
];

/// One buffer of the fake host.
#[derive(Debug, Clone)]
pub struct FakeBuffer {
	/// Buffer name.
	pub name: String,
	/// Current content.
	pub lines: Vec<String>,
	/// Backing file content, `None` when the buffer has no file.
	pub disk: Option<Vec<String>>,
	/// Buffer-local options.
	pub options: HashMap<String, Value>,
	/// Cursor line, 1-based.
	pub cursor: i64,
	/// Number of in-place reloads performed.
	pub reloads: usize,
}

impl FakeBuffer {
	fn new(name: &str, lines: Vec<String>, disk: Option<Vec<String>>) -> Self {
		let options = HashMap::from([
			("modified".to_string(), json!(0)),
			("modifiable".to_string(), json!(1)),
			("fileformat".to_string(), json!("unix")),
			("fileencoding".to_string(), json!("")),
			("filetype".to_string(), json!("")),
			("foldmethod".to_string(), json!("manual")),
		]);
		let lines = if lines.is_empty() { vec![String::new()] } else { lines };
		Self {
			name: name.to_string(),
			lines,
			disk,
			options,
			cursor: 1,
			reloads: 0,
		}
	}

	fn flag(&self, name: &str) -> bool {
		self.options.get(name).and_then(crate::value::as_flag).unwrap_or(false)
	}
}

/// One window of the fake host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeWindow {
	/// Window handle.
	pub id: WinId,
	/// Displayed buffer.
	pub bufnr: Bufnr,
	/// Owning tab page, 1-based.
	pub tabpage: i64,
}

#[derive(Debug)]
struct Failure {
	key: String,
	skip: usize,
	message: String,
}

/// Complete state of a [`FakeHost`].
#[derive(Debug)]
pub struct FakeState {
	/// Buffers by handle.
	pub buffers: BTreeMap<Bufnr, FakeBuffer>,
	/// Windows in creation order.
	pub windows: Vec<FakeWindow>,
	/// Current window.
	pub current: WinId,
	/// Defined hook groups.
	pub groups: BTreeMap<String, Vec<Hook>>,
	/// Global options.
	pub globals: HashMap<String, Value>,
	/// Every call, option access, and command, in order.
	pub log: Vec<String>,
	/// Callbacks of fired hooks awaiting delivery.
	pub fired: Vec<Callback>,
	failures: Vec<Failure>,
	next_bufnr: CounterIdGen,
	next_winid: CounterIdGen,
	tabpages: i64,
}

impl FakeState {
	fn new() -> Self {
		let mut next_bufnr = CounterIdGen::new(1);
		let mut next_winid = CounterIdGen::new(1000);
		let bufnr = Bufnr(next_bufnr.next());
		let window = FakeWindow {
			id: WinId(next_winid.next()),
			bufnr,
			tabpage: 1,
		};
		Self {
			buffers: BTreeMap::from([(bufnr, FakeBuffer::new("", Vec::new(), None))]),
			windows: vec![window],
			current: window.id,
			groups: BTreeMap::new(),
			globals: HashMap::from([
				("fileformats".to_string(), json!("unix,dos")),
				("fileencodings".to_string(), json!("ucs-bom,utf-8,default,latin1")),
			]),
			log: Vec::new(),
			fired: Vec::new(),
			failures: Vec::new(),
			next_bufnr,
			next_winid,
			tabpages: 1,
		}
	}

	fn check_failure(&mut self, key: &str) -> Result<(), String> {
		let Some(index) = self.failures.iter().position(|f| f.key == key) else {
			return Ok(());
		};
		if self.failures[index].skip > 0 {
			self.failures[index].skip -= 1;
			return Ok(());
		}
		Err(self.failures.remove(index).message)
	}

	fn window(&self, id: WinId) -> Option<&FakeWindow> {
		self.windows.iter().find(|w| w.id == id)
	}

	fn current_window(&self) -> FakeWindow {
		*self.window(self.current).unwrap_or(&self.windows[0])
	}

	fn current_bufnr(&self) -> Bufnr {
		self.current_window().bufnr
	}

	fn buffer(&self, name: &str, bufnr: Bufnr) -> HostResult<&FakeBuffer> {
		self.buffers.get(&bufnr).ok_or_else(|| call_err(name, format!("E158: Invalid buffer name: {bufnr}")))
	}

	fn buffer_mut(&mut self, name: &str, bufnr: Bufnr) -> HostResult<&mut FakeBuffer> {
		self.buffers
			.get_mut(&bufnr)
			.ok_or_else(|| call_err(name, format!("E158: Invalid buffer name: {bufnr}")))
	}

	fn editable(&mut self, name: &str, bufnr: Bufnr) -> HostResult<&mut FakeBuffer> {
		let buffer = self.buffer_mut(name, bufnr)?;
		if !buffer.flag("modifiable") {
			return Err(call_err(name, "E21: Cannot make changes, 'modifiable' is off"));
		}
		buffer.options.insert("modified".into(), json!(1));
		Ok(buffer)
	}

	fn fire(&mut self, event: &HookEvent, pattern: &HookPattern) -> Vec<Callback> {
		let mut fired = Vec::new();
		for hooks in self.groups.values_mut() {
			hooks.retain(|hook| {
				if hook.event != *event || hook.pattern != *pattern {
					return true;
				}
				fired.push(hook.callback.clone());
				!hook.once
			});
		}
		fired
	}

	fn enter(&mut self, bufnr: Bufnr) {
		let fired = self.fire(&HookEvent::BufEnter, &HookPattern::Buffer(bufnr));
		self.fired.extend(fired);
	}

	fn find_or_create(&mut self, name: &str) -> Bufnr {
		if let Some((bufnr, _)) = self.buffers.iter().find(|(_, b)| b.name == name) {
			return *bufnr;
		}
		let bufnr = Bufnr(self.next_bufnr.next());
		self.buffers.insert(bufnr, FakeBuffer::new(name, Vec::new(), None));
		bufnr
	}

	fn add_window(&mut self, bufnr: Bufnr, tabpage: i64) -> WinId {
		let id = WinId(self.next_winid.next());
		let position = self
			.windows
			.iter()
			.position(|w| w.id == self.current)
			.map_or(self.windows.len(), |p| p + 1);
		self.windows.insert(position, FakeWindow { id, bufnr, tabpage });
		id
	}

	fn display(&mut self, bufnr: Bufnr, autocmd: bool) {
		let current = self.current;
		let previous = self.current_bufnr();
		if let Some(window) = self.windows.iter_mut().find(|w| w.id == current) {
			window.bufnr = bufnr;
		}
		if autocmd && previous != bufnr {
			self.enter(bufnr);
		}
	}

	fn call(&mut self, name: &str, args: &[Value]) -> HostResult<Value> {
		self.log.push(name.to_string());
		self.check_failure(name).map_err(|message| call_err(name, message))?;

		match name {
			"bufnr" => Ok(json!(self.current_bufnr())),
			"win_getid" => Ok(json!(self.current)),
			"winnr" => {
				let current = self.current_window();
				let position = self
					.windows
					.iter()
					.filter(|w| w.tabpage == current.tabpage)
					.position(|w| w.id == current.id)
					.unwrap_or(0);
				Ok(json!(position + 1))
			}
			"tabpagenr" => Ok(json!(self.current_window().tabpage)),
			"bufwinid" => {
				let bufnr = bufnr_arg(name, args, 0)?;
				let tabpage = self.current_window().tabpage;
				let id = self
					.windows
					.iter()
					.find(|w| w.tabpage == tabpage && w.bufnr == bufnr)
					.map_or(WinId::NONE, |w| w.id);
				Ok(json!(id))
			}
			"win_findbuf" => {
				let bufnr = bufnr_arg(name, args, 0)?;
				let ids: Vec<WinId> = self.windows.iter().filter(|w| w.bufnr == bufnr).map(|w| w.id).collect();
				Ok(json!(ids))
			}
			"win_gotoid" => {
				let id = WinId(int_arg(name, args, 0)?);
				let Some(window) = self.window(id).copied() else {
					return Ok(json!(0));
				};
				let previous = self.current_bufnr();
				self.current = id;
				if previous != window.bufnr {
					self.enter(window.bufnr);
				}
				Ok(json!(1))
			}
			"line" => {
				let bufnr = self.current_bufnr();
				Ok(json!(self.buffer(name, bufnr)?.cursor))
			}
			"fnameescape" => {
				let target = string_arg(name, args, 0)?;
				Ok(json!(target.replace(' ', "\\ ")))
			}
			"getbufline" => {
				let bufnr = bufnr_arg(name, args, 0)?;
				Ok(json!(self.buffer(name, bufnr)?.lines))
			}
			"setbufline" => {
				let bufnr = bufnr_arg(name, args, 0)?;
				let lnum = int_arg(name, args, 1)?;
				let lines = lines_arg(name, args, 2)?;
				let buffer = self.editable(name, bufnr)?;
				let start = usize::try_from(lnum - 1).map_err(|_| call_err(name, "E16: Invalid range"))?;
				if start > buffer.lines.len() {
					return Err(call_err(name, "E16: Invalid range"));
				}
				for (offset, line) in lines.into_iter().enumerate() {
					match buffer.lines.get_mut(start + offset) {
						Some(slot) => *slot = line,
						None => buffer.lines.push(line),
					}
				}
				Ok(json!(0))
			}
			"deletebufline" => {
				let bufnr = bufnr_arg(name, args, 0)?;
				let first = int_arg(name, args, 1)?;
				let len = self.buffer(name, bufnr)?.lines.len() as i64;
				let last = match args.get(2).and_then(as_string).as_deref() {
					Some("$") | None => len,
					Some(other) => other.parse().map_err(|_| call_err(name, "E16: Invalid range"))?,
				};
				// Out-of-range deletes report failure through the return value.
				if first < 1 || first > last || last > len {
					return Ok(json!(1));
				}
				let buffer = self.editable(name, bufnr)?;
				buffer.lines.drain((first - 1) as usize..last as usize);
				if buffer.lines.is_empty() {
					buffer.lines.push(String::new());
				}
				Ok(json!(0))
			}
			"appendbufline" => {
				let bufnr = bufnr_arg(name, args, 0)?;
				let lnum = int_arg(name, args, 1)?;
				let lines = lines_arg(name, args, 2)?;
				let buffer = self.editable(name, bufnr)?;
				let at = usize::try_from(lnum)
					.ok()
					.filter(|at| *at <= buffer.lines.len())
					.ok_or_else(|| call_err(name, "E16: Invalid range"))?;
				buffer.lines.splice(at..at, lines);
				Ok(json!(0))
			}
			_ => Err(call_err(name, format!("E117: Unknown function: {name}"))),
		}
	}

	fn command(&mut self, text: &str) -> HostResult<()> {
		self.log.push(format!("command:{text}"));

		let mut words: &[&str] = &text.split_whitespace().collect::<Vec<_>>();
		let mut autocmd = true;
		while let Some((first, rest)) = words.split_first() {
			if !MODIFIERS.contains(first) {
				break;
			}
			autocmd &= *first != "noautocmd";
			words = rest;
		}
		let Some((head, rest)) = words.split_first() else {
			return Ok(());
		};
		let (cmd, bang) = head.strip_suffix('!').map_or((*head, false), |cmd| (cmd, true));
		let target = rest
			.iter()
			.filter(|arg| !arg.starts_with("++"))
			.copied()
			.collect::<Vec<_>>()
			.join(" ")
			.replace("\\ ", " ");

		self.check_failure(&format!("command:{cmd}")).map_err(|message| cmd_err(text, message))?;

		match cmd {
			"edit" | "e" if target.is_empty() => self.reload_current(text, bang),
			"edit" | "e" => {
				let bufnr = self.find_or_create(&target);
				self.display(bufnr, autocmd);
				Ok(())
			}
			"split" | "new" | "vsplit" | "vnew" => {
				let bufnr = self.find_or_create(&target);
				let tabpage = self.current_window().tabpage;
				self.current = self.add_window(bufnr, tabpage);
				if autocmd {
					self.enter(bufnr);
				}
				Ok(())
			}
			"tabedit" | "tabnew" => {
				let bufnr = self.find_or_create(&target);
				self.tabpages += 1;
				let tabpage = self.tabpages;
				self.current = self.add_window(bufnr, tabpage);
				if autocmd {
					self.enter(bufnr);
				}
				Ok(())
			}
			"call" | "runtime" | "source" => Ok(()),
			_ => {
				let number = cmd.strip_suffix("buffer").and_then(|n| n.parse::<i64>().ok());
				let Some(number) = number else {
					return Err(cmd_err(text, format!("E492: Not an editor command: {text}")));
				};
				let bufnr = Bufnr(number);
				if !self.buffers.contains_key(&bufnr) {
					return Err(cmd_err(text, format!("E86: Buffer {number} does not exist")));
				}
				self.display(bufnr, autocmd);
				Ok(())
			}
		}
	}

	fn reload_current(&mut self, text: &str, bang: bool) -> HostResult<()> {
		let bufnr = self.current_bufnr();
		let modified = self.buffers.get(&bufnr).is_some_and(|b| b.flag("modified"));
		if modified && !bang {
			return Err(cmd_err(text, "E37: No write since last change (add ! to override)"));
		}
		let read_hooks = self.fire(&HookEvent::BufReadCmd, &HookPattern::Buffer(bufnr));
		let Some(buffer) = self.buffers.get_mut(&bufnr) else {
			return Err(cmd_err(text, "E32: No file name"));
		};
		buffer.lines = match (&buffer.disk, read_hooks.is_empty()) {
			(Some(disk), true) => disk.clone(),
			_ => vec![String::new()],
		};
		buffer.options.insert("modified".into(), json!(0));
		buffer.reloads += 1;
		self.fired.extend(read_hooks);
		Ok(())
	}
}

/// In-memory host editor implementing every collaborator trait.
#[derive(Debug)]
pub struct FakeHost {
	state: Mutex<FakeState>,
}

impl Default for FakeHost {
	fn default() -> Self {
		Self::new()
	}
}

impl FakeHost {
	/// Creates a host with one window showing an empty unnamed buffer (`1`).
	pub fn new() -> Self {
		Self {
			state: Mutex::new(FakeState::new()),
		}
	}

	/// Runs `f` with exclusive access to the host state.
	pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
		f(&mut self.state.lock())
	}

	/// Adds a hidden buffer with no backing file.
	pub fn add_buffer(&self, name: &str, lines: &[&str]) -> Bufnr {
		self.insert_buffer(name, owned(lines), None)
	}

	/// Adds a hidden buffer backed by a file holding `lines`.
	pub fn add_file_buffer(&self, name: &str, lines: &[&str]) -> Bufnr {
		self.insert_buffer(name, owned(lines), Some(owned(lines)))
	}

	fn insert_buffer(&self, name: &str, lines: Vec<String>, disk: Option<Vec<String>>) -> Bufnr {
		self.with_state(|state| {
			let bufnr = Bufnr(state.next_bufnr.next());
			state.buffers.insert(bufnr, FakeBuffer::new(name, lines, disk));
			bufnr
		})
	}

	/// Opens a window showing `bufnr` in the current tab without focusing it.
	pub fn split(&self, bufnr: Bufnr) -> WinId {
		self.with_state(|state| {
			let tabpage = state.current_window().tabpage;
			state.add_window(bufnr, tabpage)
		})
	}

	/// Current window.
	pub fn current_window(&self) -> WinId {
		self.with_state(|state| state.current)
	}

	/// Buffer of the current window.
	pub fn current_buffer(&self) -> Bufnr {
		self.with_state(|state| state.current_bufnr())
	}

	/// Content of `bufnr`.
	pub fn lines(&self, bufnr: Bufnr) -> Vec<String> {
		self.with_state(|state| state.buffers.get(&bufnr).map(|b| b.lines.clone()).unwrap_or_default())
	}

	/// Edits `bufnr` the way a user would, marking it modified.
	pub fn set_lines(&self, bufnr: Bufnr, lines: &[&str]) {
		self.with_state(|state| {
			if let Some(buffer) = state.buffers.get_mut(&bufnr) {
				buffer.lines = owned(lines);
				buffer.options.insert("modified".into(), json!(1));
			}
		});
	}

	/// Moves the cursor of `bufnr` to `lnum`.
	pub fn set_cursor(&self, bufnr: Bufnr, lnum: i64) {
		self.with_state(|state| {
			if let Some(buffer) = state.buffers.get_mut(&bufnr) {
				buffer.cursor = lnum;
			}
		});
	}

	/// Buffer-local option of `bufnr`, `Null` when unset.
	pub fn option(&self, bufnr: Bufnr, name: &str) -> Value {
		self.with_state(|state| {
			state
				.buffers
				.get(&bufnr)
				.and_then(|b| b.options.get(name).cloned())
				.unwrap_or(Value::Null)
		})
	}

	/// Sets a buffer-local option directly.
	pub fn set_option(&self, bufnr: Bufnr, name: &str, value: Value) {
		self.with_state(|state| {
			if let Some(buffer) = state.buffers.get_mut(&bufnr) {
				buffer.options.insert(name.to_string(), value);
			}
		});
	}

	/// Sets a global option directly.
	pub fn set_global(&self, name: &str, value: Value) {
		self.with_state(|state| {
			state.globals.insert(name.to_string(), value);
		});
	}

	/// Number of in-place reloads `bufnr` went through.
	pub fn reloads(&self, bufnr: Bufnr) -> usize {
		self.with_state(|state| state.buffers.get(&bufnr).map_or(0, |b| b.reloads))
	}

	/// Hooks of `group`, if defined.
	pub fn group(&self, group: &str) -> Option<Vec<Hook>> {
		self.with_state(|state| state.groups.get(group).cloned())
	}

	/// Names of every defined group.
	pub fn groups(&self) -> Vec<String> {
		self.with_state(|state| state.groups.keys().cloned().collect())
	}

	/// Fires `event` for `bufnr` and returns the matched callbacks.
	pub fn fire(&self, event: HookEvent, bufnr: Bufnr) -> Vec<Callback> {
		self.with_state(|state| state.fire(&event, &HookPattern::Buffer(bufnr)))
	}

	/// Fires a user event named `pattern` and returns the matched callbacks.
	pub fn fire_user(&self, pattern: &str) -> Vec<Callback> {
		self.with_state(|state| state.fire(&HookEvent::User, &HookPattern::Name(pattern.to_string())))
	}

	/// Drains callbacks fired as a side effect of calls and commands.
	pub fn take_fired(&self) -> Vec<Callback> {
		self.with_state(|state| std::mem::take(&mut state.fired))
	}

	/// Log of calls (`name`), option access (`getbufvar:opt`, `setbufvar:opt`,
	/// `global:opt`), group changes (`augroup:name`), and commands (`command:text`).
	pub fn log(&self) -> Vec<String> {
		self.with_state(|state| state.log.clone())
	}

	/// Number of log entries equal to `entry`.
	pub fn count(&self, entry: &str) -> usize {
		self.with_state(|state| state.log.iter().filter(|e| *e == entry).count())
	}

	/// Fails the next operation keyed `key` with `message`.
	///
	/// Keys are call names, `getbufvar:opt`, `setbufvar:opt`, `global:opt`,
	/// `augroup`, or `command:cmd` where `cmd` is the command word.
	pub fn fail_next(&self, key: &str, message: &str) {
		self.fail_after(key, 0, message);
	}

	/// Like [`FakeHost::fail_next`] but lets `skip` matching operations through first.
	pub fn fail_after(&self, key: &str, skip: usize, message: &str) {
		self.with_state(|state| {
			state.failures.push(Failure {
				key: key.to_string(),
				skip,
				message: message.to_string(),
			});
		});
	}
}

#[async_trait]
impl Rpc for FakeHost {
	async fn call(&self, name: &str, args: Vec<Value>) -> HostResult<Value> {
		self.with_state(|state| state.call(name, &args))
	}

	async fn command(&self, text: &str, _locals: Option<Map<String, Value>>) -> HostResult<()> {
		self.with_state(|state| state.command(text))
	}
}

#[async_trait]
impl Options for FakeHost {
	async fn buf_option(&self, bufnr: Bufnr, name: &str) -> HostResult<Value> {
		self.with_state(|state| {
			let key = format!("getbufvar:{name}");
			state.log.push(key.clone());
			state.check_failure(&key).map_err(|message| call_err("getbufvar", message))?;
			let buffer = state.buffer("getbufvar", bufnr)?;
			Ok(buffer.options.get(name).cloned().unwrap_or_else(|| json!("")))
		})
	}

	async fn set_buf_option(&self, bufnr: Bufnr, name: &str, value: Value) -> HostResult<()> {
		self.with_state(|state| {
			let key = format!("setbufvar:{name}");
			state.log.push(key.clone());
			state.check_failure(&key).map_err(|message| call_err("setbufvar", message))?;
			let buffer = state.buffer_mut("setbufvar", bufnr)?;
			buffer.options.insert(name.to_string(), value);
			Ok(())
		})
	}

	async fn global_option(&self, name: &str) -> HostResult<Value> {
		self.with_state(|state| {
			let key = format!("global:{name}");
			state.log.push(key.clone());
			state.check_failure(&key).map_err(|message| call_err("getglobal", message))?;
			Ok(state.globals.get(name).cloned().unwrap_or_else(|| json!("")))
		})
	}
}

#[async_trait]
impl Autocmd for FakeHost {
	async fn define_group(&self, group: &str, hooks: Vec<Hook>) -> HostResult<()> {
		self.with_state(|state| {
			state.log.push(format!("augroup:{group}"));
			state.check_failure("augroup").map_err(|message| call_err("augroup", message))?;
			state.groups.insert(group.to_string(), hooks);
			Ok(())
		})
	}

	async fn remove_group(&self, group: &str) -> HostResult<()> {
		self.with_state(|state| {
			state.log.push(format!("augroup!:{group}"));
			state.groups.remove(group);
			Ok(())
		})
	}
}

#[async_trait]
impl Batch for FakeHost {
	async fn batch(&self, calls: Vec<Call>) -> HostResult<Vec<Value>> {
		self.with_state(|state| calls.iter().map(|call| state.call(&call.name, &call.args)).collect())
	}
}

fn owned(lines: &[&str]) -> Vec<String> {
	lines.iter().map(|l| l.to_string()).collect()
}

fn call_err(name: &str, message: impl Into<String>) -> HostError {
	HostError::Call {
		name: name.to_string(),
		message: message.into(),
	}
}

fn cmd_err(command: &str, message: impl Into<String>) -> HostError {
	HostError::Command {
		command: command.to_string(),
		message: message.into(),
	}
}

fn int_arg(name: &str, args: &[Value], index: usize) -> HostResult<i64> {
	args.get(index)
		.and_then(as_int)
		.ok_or_else(|| call_err(name, format!("E474: Invalid argument {index}")))
}

fn bufnr_arg(name: &str, args: &[Value], index: usize) -> HostResult<Bufnr> {
	int_arg(name, args, index).map(Bufnr)
}

fn string_arg(name: &str, args: &[Value], index: usize) -> HostResult<String> {
	args.get(index)
		.and_then(as_string)
		.ok_or_else(|| call_err(name, format!("E474: Invalid argument {index}")))
}

fn lines_arg(name: &str, args: &[Value], index: usize) -> HostResult<Vec<String>> {
	args.get(index)
		.and_then(as_lines)
		.ok_or_else(|| call_err(name, format!("E474: Invalid argument {index}")))
}
