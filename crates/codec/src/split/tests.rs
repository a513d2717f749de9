use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

#[test]
fn trailing_delimiter_and_missing_delimiter_converge() {
	assert_eq!(split("a\nb\n", FileFormat::Unix), vec!["a", "b"]);
	assert_eq!(split("a\nb", FileFormat::Unix), vec!["a", "b"]);
}

#[test]
fn only_one_trailing_delimiter_is_dropped() {
	assert_eq!(split("a\n\n", FileFormat::Unix), vec!["a", ""]);
	assert_eq!(split("\n", FileFormat::Unix), vec![""]);
}

#[test]
fn empty_text_has_no_lines() {
	assert_eq!(split("", FileFormat::Dos), Vec::<String>::new());
}

#[test]
fn dos_lines_carry_no_carriage_returns() {
	assert_eq!(split("a\r\nb\r\n", FileFormat::Dos), vec!["a", "b"]);
}

#[test]
fn mac_splits_on_bare_cr() {
	assert_eq!(split("a\rb", FileFormat::Mac), vec!["a", "b"]);
}

#[test]
fn foreign_delimiters_stay_inside_lines() {
	assert_eq!(split("a\r\nb\n", FileFormat::Unix), vec!["a\r", "b"]);
}

proptest! {
	#[test]
	fn joined_lines_reproduce_delimiter_terminated_text(lines in prop::collection::vec("[a-z ]{0,6}", 1..8)) {
		let text: String = lines.iter().map(|l| format!("{l}\n")).collect();
		prop_assert_eq!(split(&text, FileFormat::Unix), lines);
	}

	#[test]
	fn lines_never_contain_the_delimiter(text in "[ab\r\n]{0,32}") {
		for format in FileFormat::ALL {
			for line in split(&text, format) {
				prop_assert!(!line.contains(format.delimiter()));
			}
		}
	}
}
