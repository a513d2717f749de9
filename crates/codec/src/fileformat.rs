use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Line-ending convention of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
	/// `\n`
	Unix,
	/// `\r\n`
	Dos,
	/// `\r`
	Mac,
}

impl FileFormat {
	/// Every format, in the order the host lists them.
	pub const ALL: [FileFormat; 3] = [FileFormat::Unix, FileFormat::Dos, FileFormat::Mac];

	/// Returns the exact delimiter bound to this format.
	pub const fn delimiter(self) -> &'static str {
		match self {
			FileFormat::Unix => "\n",
			FileFormat::Dos => "\r\n",
			FileFormat::Mac => "\r",
		}
	}

	/// Returns the host option spelling of this format.
	pub const fn as_str(self) -> &'static str {
		match self {
			FileFormat::Unix => "unix",
			FileFormat::Dos => "dos",
			FileFormat::Mac => "mac",
		}
	}
}

impl fmt::Display for FileFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A format name the host reported that maps to no known convention.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported file format: {0:?}")]
pub struct UnsupportedFormat(pub String);

impl FromStr for FileFormat {
	type Err = UnsupportedFormat;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"unix" => Ok(FileFormat::Unix),
			"dos" => Ok(FileFormat::Dos),
			"mac" => Ok(FileFormat::Mac),
			other => Err(UnsupportedFormat(other.to_string())),
		}
	}
}

/// Parses a comma separated host list such as `"unix,dos"`.
///
/// Empty entries are ignored; an unknown entry fails the whole list.
pub fn parse_list(list: &str) -> Result<Vec<FileFormat>, UnsupportedFormat> {
	list.split(',')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(FileFormat::from_str)
		.collect()
}

/// Moves [`FileFormat::Dos`] ahead of [`FileFormat::Unix`] when both are present.
///
/// Every `\r\n` contains a `\n`, so testing `unix` first would misclassify
/// dos content. Relative order is otherwise preserved.
pub fn prioritize_dos(candidates: &[FileFormat]) -> Vec<FileFormat> {
	let mut ordered = candidates.to_vec();
	let unix = ordered.iter().position(|f| *f == FileFormat::Unix);
	let dos = ordered.iter().position(|f| *f == FileFormat::Dos);
	if let (Some(unix), Some(dos)) = (unix, dos)
		&& dos > unix
	{
		let dos = ordered.remove(dos);
		ordered.insert(unix, dos);
	}
	ordered
}

/// Returns the first candidate whose delimiter occurs anywhere in `text`.
///
/// Candidates are tested in the given order. `None` means no candidate's
/// delimiter occurs; callers fall back to the buffer's configured format.
pub fn detect(text: &str, candidates: &[FileFormat]) -> Option<FileFormat> {
	candidates.iter().copied().find(|f| text.contains(f.delimiter()))
}

#[cfg(test)]
mod tests;
