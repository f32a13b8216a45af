//! Statement-stacking screen for caller-supplied filter fragments.
//!
//! Filter text is spliced into generated SQL verbatim, so the only thing this
//! screen blocks is a statement separator that sits outside a matched pair of
//! single, double or backtick quotes. It is a heuristic, not a parser: it does
//! not understand comments, bracketed identifiers or dialect escape rules, and
//! doubled quotes simply close and reopen a pair.

use crate::error::{DbError, DbResult};

const STATEMENT_SEPARATOR: u8 = b';';
const QUOTES: [u8; 3] = [b'\'', b'"', b'`'];

/// Result of screening a filter fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterCheckResult {
    /// No unquoted separator found
    Accepted,
    /// An unquoted separator was found at this byte offset
    Rejected { position: usize },
}

impl FilterCheckResult {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Find the first statement separator that is not enclosed in a matched quote pair.
///
/// A quote with no matching closer is treated as a literal character, so a
/// separator after an unterminated quote counts as unquoted. The separator and
/// quotes are ASCII, so scanning bytes never splits a multi-byte character.
pub fn screen_filter(text: &str) -> FilterCheckResult {
    let bytes = text.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        let byte = bytes[pos];
        if byte == STATEMENT_SEPARATOR {
            return FilterCheckResult::Rejected { position: pos };
        }
        if QUOTES.contains(&byte) {
            if let Some(close) = bytes[pos + 1..].iter().position(|&b| b == byte) {
                pos += close + 2;
                continue;
            }
        }
        pos += 1;
    }
    FilterCheckResult::Accepted
}

/// `true` when the text contains a statement separator outside any quote pair.
pub fn has_potential_sql_injection(text: &str) -> bool {
    screen_filter(text).is_rejected()
}

/// Screen a filter and convert a rejection into an error.
pub fn check_filter(text: &str) -> DbResult<()> {
    match screen_filter(text) {
        FilterCheckResult::Accepted => Ok(()),
        FilterCheckResult::Rejected { position } => Err(DbError::invalid_input(format!(
            "Filter contains an unquoted statement separator at offset {}",
            position
        ))),
    }
}
