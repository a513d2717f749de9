//! Byte-to-line decoding for host editor buffers.
//!
//! Three independent signals feed a deterministic decode:
//! * the host's acceptable encoding list ([`decode`])
//! * the host's acceptable file format list ([`detect`])
//! * the bytes themselves
//!
//! [`split`] then turns the decoded text into the line sequence a buffer holds.

#![warn(missing_docs)]

/// Candidate-ordered character decoding.
pub mod encoding;
/// Line-ending conventions and detection.
pub mod fileformat;
/// Splitting decoded text into buffer lines.
pub mod split;

pub use encoding::{DecodedText, decode};
pub use fileformat::{FileFormat, UnsupportedFormat, detect, parse_list, prioritize_dos};
pub use split::split;
