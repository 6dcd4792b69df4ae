//! Validation System - Structured Violations
//!
//! The schema validator never stops at the first problem. Every check
//! produces a structured violation so the whole list reaches the user.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationRule {
    UnknownField,
    MissingField,
    WrongType,
    NoMatchingVariant,
    ConfigVersion,
    DuplicateDocument,
    NoDocuments,
}

impl ViolationRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownField => "unknown_field",
            Self::MissingField => "missing_field",
            Self::WrongType => "wrong_type",
            Self::NoMatchingVariant => "no_matching_variant",
            Self::ConfigVersion => "config_version",
            Self::DuplicateDocument => "duplicate_document",
            Self::NoDocuments => "no_documents",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Violation {
    /// Dotted location inside the configuration, e.g. `documents[1].dependencies`.
    pub location: String,
    pub rule: ViolationRule,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

impl Violation {
    pub fn new(location: impl Into<String>, rule: ViolationRule, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            rule,
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    pub fn expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = if self.location.is_empty() { "<root>" } else { &self.location };
        write!(f, "{}: {} ({})", location, self.message, self.rule.as_str())?;
        match (&self.expected, &self.actual) {
            (Some(expected), Some(actual)) => write!(f, " [expected {expected}, got {actual}]"),
            (Some(expected), None) => write!(f, " [expected {expected}]"),
            (None, Some(actual)) => write!(f, " [got {actual}]"),
            (None, None) => Ok(()),
        }
    }
}

/// Location builder used while walking nested values.
pub(crate) fn child_location(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

pub(crate) fn index_location(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_expectation() {
        let v = Violation::new("config_version", ViolationRule::WrongType, "Wrong type")
            .expected("integer")
            .actual("string");
        assert_eq!(
            v.to_string(),
            "config_version: Wrong type (wrong_type) [expected integer, got string]"
        );
    }

    #[test]
    fn test_locations() {
        assert_eq!(child_location("", "documents"), "documents");
        assert_eq!(index_location("documents", 2), "documents[2]");
        assert_eq!(child_location("documents[2]", "path"), "documents[2].path");
    }
}
