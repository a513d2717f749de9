use crate::FileFormat;

/// Splits `text` into buffer lines on the delimiter of `format`.
///
/// A single trailing delimiter terminates the last line rather than opening
/// an empty one, so `"a\nb\n"` and `"a\nb"` both yield `["a", "b"]`.
///
/// Empty text has no lines at all and yields `[]`, while a lone delimiter is
/// one empty line. A host buffer always shows at least one line, so replacing
/// content with either result leaves the same single empty line.
pub fn split(text: &str, format: FileFormat) -> Vec<String> {
	if text.is_empty() {
		return Vec::new();
	}
	let body = text.strip_suffix(format.delimiter()).unwrap_or(text);
	body.split(format.delimiter()).map(str::to_string).collect()
}

#[cfg(test)]
mod tests;
