//! Flat record encodings of the board.
//!
//! - [`snapshot`]: the JSON array kept in the key-value store
//! - [`exchange`]: the CSV export/import format
//!
//! Both decode into [`DecodedRecord`]s, which the board validates with the
//! same rules as interactive input.

pub mod exchange;
pub mod snapshot;

use crate::task::TaskDraft;

/// One record read back from an encoding, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRecord {
    pub id: Option<String>,
    pub draft: TaskDraft,
}

/// Interpret loosely-typed booleans written by older boards.
pub(crate) fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "sim"
    )
}

#[cfg(test)]
mod tests {
    use super::parse_flag;

    #[test]
    fn flags() {
        assert!(parse_flag(" TRUE "));
        assert!(parse_flag("1"));
        assert!(parse_flag("sim"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
        assert!(!parse_flag("maybe"));
    }
}
