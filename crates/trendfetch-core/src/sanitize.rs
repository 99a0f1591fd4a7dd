//! Key sanitization for record file names.
//!
//! A key keeps its letters and numbers (any script), spaces and
//! underscores; everything else is dropped and spaces become underscores.
//! Combining marks are not letters, so vowel signs in scripts such as
//! Devanagari are dropped along with punctuation.

use lazy_static::lazy_static;
use regex::Regex;

/// Suffix appended to every record file name.
pub const RECORD_FILE_SUFFIX: &str = "_trends.json";

lazy_static! {
    /// Characters that never survive sanitization.
    static ref DISALLOWED_PATTERN: Regex = Regex::new(
        r"[^\p{L}\p{N} _]"
    ).unwrap();
}

/// Sanitize a key into a file-name-safe stem.
///
/// May return an empty string when the key has no allowed characters.
pub fn sanitize_key(key: &str) -> String {
    DISALLOWED_PATTERN.replace_all(key, "").replace(' ', "_")
}

/// File name of the record for `key`, or `None` if the key sanitizes to nothing.
pub fn record_file_name(key: &str) -> Option<String> {
    let stem = sanitize_key(key);
    if stem.is_empty() {
        None
    } else {
        Some(format!("{}{}", stem, RECORD_FILE_SUFFIX))
    }
}
