//! Host-initiated routine invocation.
//!
//! The host only knows routines by their registered names; hooks and host
//! scripts call back through [`Buffers::dispatch`], which maps the name to
//! one of the session's fixed behaviours.

use bufsync_codec::FileFormat;
use bufsync_rpc::value::{as_int, as_string};
use bufsync_rpc::{Bufnr, Host, Value};

use crate::protocol::{AppendOptions, Buffers, OpenOptions, ReplaceOptions, lines_arg};
use crate::session::RoutineKind;
use crate::{Error, Result};

impl<H: Host> Buffers<H> {
	/// Runs the routine registered as `name` with host-supplied `args`.
	///
	/// Argument layouts:
	/// * open: `target`, optional options object
	/// * reload, concrete store/restore, deferred reload: `bufnr`
	/// * append: `bufnr`, `lines`, optional `lnum`
	/// * replace: `bufnr`, `lines`, optional `fileformat`, optional `fileencoding`
	/// * teardown: none
	pub async fn dispatch(&self, name: &str, args: Vec<Value>) -> Result<Value> {
		let state = self.state().await?;
		let kind = state
			.routines()
			.kind_of(name)
			.ok_or_else(|| Error::UnknownRoutine(name.to_string()))?;
		tracing::trace!(routine = name, ?kind, "dispatch");

		match kind {
			RoutineKind::Open => {
				let target = args
					.first()
					.and_then(as_string)
					.ok_or_else(|| Error::invalid_args(name, "expected a target"))?;
				let options = match args.get(1) {
					None | Some(Value::Null) => OpenOptions::default(),
					Some(value) => serde_json::from_value(value.clone()).map_err(|e| Error::invalid_args(name, e.to_string()))?,
				};
				let opened = self.open(&target, &options).await?;
				serde_json::to_value(opened).map_err(|e| Error::invalid_args(name, e.to_string()))
			}
			RoutineKind::Reload => {
				self.reload(bufnr_arg(name, &args)?).await?;
				Ok(Value::Null)
			}
			RoutineKind::Append => {
				let bufnr = bufnr_arg(name, &args)?;
				let lines = lines_arg(name, args.get(1))?;
				let lnum = optional(&args, 2).map(|v| as_int(v).ok_or_else(|| Error::invalid_args(name, "lnum must be a number")));
				let options = AppendOptions { lnum: lnum.transpose()? };
				self.append(bufnr, &lines, options).await?;
				Ok(Value::Null)
			}
			RoutineKind::Replace => {
				let bufnr = bufnr_arg(name, &args)?;
				let lines = lines_arg(name, args.get(1))?;
				let fileformat = optional(&args, 2)
					.and_then(as_string)
					.map(|f| f.parse::<FileFormat>())
					.transpose()?;
				let fileencoding = optional(&args, 3).and_then(as_string);
				let options = ReplaceOptions { fileformat, fileencoding };
				self.replace(bufnr, &lines, &options).await?;
				Ok(Value::Null)
			}
			RoutineKind::ConcreteStore => {
				self.concrete_store(bufnr_arg(name, &args)?).await?;
				Ok(Value::Null)
			}
			RoutineKind::ConcreteRestore => {
				self.concrete_restore(bufnr_arg(name, &args)?).await?;
				Ok(Value::Null)
			}
			RoutineKind::DeferredReload => {
				self.deferred_reload(bufnr_arg(name, &args)?).await?;
				Ok(Value::Null)
			}
			RoutineKind::Teardown => {
				self.teardown().await?;
				Ok(Value::Null)
			}
		}
	}
}

fn bufnr_arg(routine: &str, args: &[Value]) -> Result<Bufnr> {
	args.first()
		.and_then(as_int)
		.map(Bufnr)
		.ok_or_else(|| Error::invalid_args(routine, "expected a buffer number"))
}

/// Positional argument `index`, treating an explicit null as absent.
fn optional(args: &[Value], index: usize) -> Option<&Value> {
	args.get(index).filter(|value| !value.is_null())
}
