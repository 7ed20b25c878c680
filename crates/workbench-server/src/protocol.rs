//! Wire vocabulary
//!
//! Client lines are ASCII, `:`-separated and `\n`-terminated. Acknowledgments
//! carry no trailing newline; result headers do.

use std::fmt;

/// Login command keyword
pub const LOGIN: &str = "login";

/// Model upload / result header keyword
pub const MODEL: &str = "Model";

/// Algorithm submission keyword
pub const ALGORITHM: &str = "Algorithm";

/// Positive acknowledgment of a model upload
pub const SUCCESS: &[u8] = b"Success:0";

/// Generic failure response
pub const ERROR: &[u8] = b"Error:0";

/// What a declared-length payload contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Model,
    Algorithm,
}

impl PayloadKind {
    /// Command keyword
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PayloadKind::Model => MODEL,
            PayloadKind::Algorithm => ALGORITHM,
        }
    }

    /// Parse a command keyword (case-sensitive)
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            MODEL => Some(PayloadKind::Model),
            ALGORITHM => Some(PayloadKind::Algorithm),
            _ => None,
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `<kind>:<len>\n`
#[must_use]
pub fn payload_header(kind: PayloadKind, len: usize) -> String {
    format!("{kind}:{len}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_format() {
        assert_eq!(payload_header(PayloadKind::Model, 128), "Model:128\n");
        assert_eq!(payload_header(PayloadKind::Algorithm, 0), "Algorithm:0\n");
    }

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(PayloadKind::from_keyword("Model"), Some(PayloadKind::Model));
        assert_eq!(PayloadKind::from_keyword("Algorithm"), Some(PayloadKind::Algorithm));
        assert_eq!(PayloadKind::from_keyword("model"), None);
        assert_eq!(PayloadKind::from_keyword("login"), None);
    }
}
