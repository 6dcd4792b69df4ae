//! Error types for composition, resolution and dependency recording.

use std::path::PathBuf;
use thiserror::Error;

use crate::validation::Violation;

/// Fatal failures of the configuration phase.
///
/// Every variant aborts the build; nothing here is retried.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error(transparent)]
    PluginLoad(#[from] PluginLoadError),

    #[error("Schema composition failed: field '{field}' declared by '{first}' conflicts with the declaration from '{second}'")]
    SchemaComposition {
        field: String,
        first: String,
        second: String,
    },

    #[error("Validation failed: {}", format_violations(.0))]
    Validation(Vec<Violation>),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("Failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ComposeError {
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Validation(violations) => violations,
            _ => &[],
        }
    }

    pub(crate) fn single(violation: Violation) -> Self {
        Self::Validation(vec![violation])
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
#[error("Error loading plugin \"{identifier}\": {reason}")]
pub struct PluginLoadError {
    pub identifier: String,
    pub reason: PluginLoadReason,
}

#[derive(Debug, Error)]
pub enum PluginLoadReason {
    #[error("no plugin with this identifier is available")]
    NotFound,

    #[error("plugin requires engine >= {required}, current is {current}")]
    EngineTooOld { required: String, current: String },

    #[error("invalid version requirement '{0}'")]
    InvalidVersion(String),

    #[error("{0}")]
    Factory(String),
}

/// A per-document setting that cannot be narrowed to exactly one value.
#[derive(Debug, Error)]
#[error("Could not resolve {setting} for document '{}': {reason}", .document.display())]
pub struct ResolutionError {
    pub setting: String,
    pub document: PathBuf,
    pub reason: String,
}

/// A malformed edge delivered by the engine. Logged and skipped, never fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeDependencyError {
    #[error("rule '{rule}' reported no outputs")]
    NoOutputs { rule: String },

    #[error("rule '{rule}' reported an empty {role} path")]
    EmptyPath { rule: String, role: &'static str },
}
