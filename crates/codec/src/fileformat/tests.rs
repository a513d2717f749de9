use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

#[test]
fn crlf_text_is_dos_when_dos_is_tested_first() {
	let text = "a\r\nb\r\n";
	assert_eq!(detect(text, &[FileFormat::Dos, FileFormat::Unix, FileFormat::Mac]), Some(FileFormat::Dos));
}

#[test]
fn candidate_order_decides_between_overlapping_delimiters() {
	let text = "a\r\nb";
	assert_eq!(detect(text, &[FileFormat::Unix, FileFormat::Dos]), Some(FileFormat::Unix));
	assert_eq!(detect(text, &[FileFormat::Mac, FileFormat::Dos]), Some(FileFormat::Mac));
}

#[test]
fn no_delimiter_yields_none() {
	assert_eq!(detect("single line", &FileFormat::ALL), None);
	assert_eq!(detect("", &FileFormat::ALL), None);
	assert_eq!(detect("a\nb", &[FileFormat::Dos, FileFormat::Mac]), None);
}

#[test]
fn bare_cr_is_mac() {
	assert_eq!(detect("a\rb\r", &[FileFormat::Dos, FileFormat::Unix, FileFormat::Mac]), Some(FileFormat::Mac));
}

#[test]
fn parse_list_follows_host_spelling() {
	assert_eq!(parse_list("unix,dos").unwrap(), vec![FileFormat::Unix, FileFormat::Dos]);
	assert_eq!(parse_list(" dos , mac ,").unwrap(), vec![FileFormat::Dos, FileFormat::Mac]);
	assert_eq!(parse_list("").unwrap(), Vec::<FileFormat>::new());
	assert_eq!(parse_list("unix,amiga"), Err(UnsupportedFormat("amiga".into())));
}

#[test]
fn prioritize_dos_moves_dos_before_unix_only() {
	use FileFormat::*;
	assert_eq!(prioritize_dos(&[Unix, Dos]), vec![Dos, Unix]);
	assert_eq!(prioritize_dos(&[Mac, Unix, Dos]), vec![Mac, Dos, Unix]);
	assert_eq!(prioritize_dos(&[Dos, Unix, Mac]), vec![Dos, Unix, Mac]);
	assert_eq!(prioritize_dos(&[Unix, Mac]), vec![Unix, Mac]);
}

#[test]
fn display_round_trips_through_from_str() {
	for format in FileFormat::ALL {
		assert_eq!(format.to_string().parse::<FileFormat>(), Ok(format));
	}
}

proptest! {
	#[test]
	fn detected_format_delimiter_occurs_in_text(text in "[ab\r\n]{0,24}") {
		let candidates = prioritize_dos(&FileFormat::ALL);
		match detect(&text, &candidates) {
			Some(format) => prop_assert!(text.contains(format.delimiter())),
			None => prop_assert!(!text.contains('\n') && !text.contains('\r')),
		}
	}
}
