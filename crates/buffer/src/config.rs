//! Naming and host integration settings.
//!
//! ```toml
//! routine_prefix = "BufsyncBuffer"
//! group_prefix = "bufsync_buffer"
//! teardown_event = "BufsyncSessionTeardown"
//! dispatch_script = "runtime autoload/bufsync.vim"
//! ```
//!
//! Every key is optional; missing keys take the defaults above.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Settings shared by every session of a [`SessionRegistry`](crate::SessionRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
	/// Prefix of per-session routine names, e.g. `BufsyncBufferReplace_<suffix>`.
	pub routine_prefix: String,
	/// Prefix of hook group names, e.g. `bufsync_buffer_concrete_<suffix>_<bufnr>`.
	pub group_prefix: String,
	/// User event the host raises when a session ends.
	pub teardown_event: String,
	/// Host command loading the routine forwarding shim.
	pub dispatch_script: String,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			routine_prefix: "BufsyncBuffer".into(),
			group_prefix: "bufsync_buffer".into(),
			teardown_event: "BufsyncSessionTeardown".into(),
			dispatch_script: "runtime autoload/bufsync.vim".into(),
		}
	}
}

impl Config {
	/// Parses and validates a TOML document.
	pub fn parse(input: &str) -> Result<Self, ConfigError> {
		let config: Config = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads and parses a TOML file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::parse(&input)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		// Routine and group names end up as host identifiers.
		for (key, value) in [
			("routine_prefix", &self.routine_prefix),
			("group_prefix", &self.group_prefix),
			("teardown_event", &self.teardown_event),
		] {
			if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '#') {
				return Err(ConfigError::Invalid(format!("{key} must be a non-empty identifier, got {value:?}")));
			}
		}
		if self.dispatch_script.trim().is_empty() {
			return Err(ConfigError::Invalid("dispatch_script must not be empty".into()));
		}
		Ok(())
	}
}
