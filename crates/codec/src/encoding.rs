use encoding_rs::{Encoding, UTF_8};

/// Host label asking for byte-order-mark sniffing rather than a fixed encoding.
pub const UCS_BOM: &str = "ucs-bom";

/// Fallback candidate list when the host supplies none.
const DEFAULT_LABEL: &str = "utf-8";

/// Host encoding names that the WHATWG label table spells differently.
const ALIASES: &[(&str, &str)] = &[
	("cp932", "shift_jis"),
	("cp936", "gbk"),
	("cp949", "euc-kr"),
	("cp950", "big5"),
	("ucs-2", "utf-16be"),
	("ucs-2le", "utf-16le"),
	("utf-16", "utf-16be"),
];

/// Text paired with the encoding label that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
	/// Label of the winning candidate, as the caller spelled it.
	pub encoding: String,
	/// Decoded text.
	pub text: String,
}

/// Resolves a host encoding label to an [`Encoding`].
pub fn resolve(label: &str) -> Option<&'static Encoding> {
	let label = label.trim();
	let canonical = ALIASES
		.iter()
		.find(|(alias, _)| alias.eq_ignore_ascii_case(label))
		.map_or(label, |(_, target)| target);
	Encoding::for_label(canonical.as_bytes())
}

/// Decodes `bytes` with the first candidate that validates cleanly.
///
/// Unknown labels are skipped. When no candidate validates, the last one is
/// used lossily and still reported; if that label cannot be resolved the lossy
/// decode falls back to UTF-8. This never fails.
pub fn decode(bytes: &[u8], candidates: &[String]) -> DecodedText {
	for label in candidates {
		if let Some(decoded) = try_decode(bytes, label) {
			return decoded;
		}
	}

	let last = candidates.last().map_or(DEFAULT_LABEL, String::as_str);
	let (text, _) = if last.eq_ignore_ascii_case(UCS_BOM) {
		let (text, _, had_errors) = UTF_8.decode(bytes);
		(text, had_errors)
	} else {
		resolve(last).unwrap_or(UTF_8).decode_without_bom_handling(bytes)
	};
	DecodedText {
		encoding: last.to_string(),
		text: text.into_owned(),
	}
}

fn try_decode(bytes: &[u8], label: &str) -> Option<DecodedText> {
	if label.eq_ignore_ascii_case(UCS_BOM) {
		let (encoding, bom_len) = Encoding::for_bom(bytes)?;
		let text = encoding.decode_without_bom_handling_and_without_replacement(&bytes[bom_len..])?;
		return Some(DecodedText {
			encoding: encoding.name().to_ascii_lowercase(),
			text: text.into_owned(),
		});
	}

	let encoding = resolve(label)?;
	let text = encoding.decode_without_bom_handling_and_without_replacement(bytes)?;
	Some(DecodedText {
		encoding: label.to_string(),
		text: text.into_owned(),
	})
}
