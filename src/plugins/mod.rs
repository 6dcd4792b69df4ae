//! Plugin System - Capabilities Instead of Dynamic Hooks
//!
//! A plugin is an object with an identifier that opts into any of the
//! capability traits below. The registry walks the active plugins in
//! registration order and collects what each capability returns.

pub mod base;
pub mod render_dag;
pub mod tex;
pub mod vcs;

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::config::{Configuration, Document};
use crate::error::ComposeError;
use crate::schema::SchemaFragment;

pub use base::BasePlugin;
pub use render_dag::RenderDagPlugin;
pub use tex::{TexPlugin, Theme};
pub use vcs::{TrackedFiles, VcsPlugin};

/// Owns the base configuration and document fields. Always registered first.
pub const CONFIG_PLUGIN: &str = "docforge.config";
/// The document rendering plugin, active unless explicitly disabled.
pub const TEX_PLUGIN: &str = "docforge.plugins.tex";
pub const VCS_PLUGIN: &str = "docforge.plugins.vcs";
pub const RENDER_DAG_PLUGIN: &str = "docforge.plugins.render_dag";

/// Prefix stripped from plugin identifiers when deriving rule names.
pub const PLUGIN_NAMESPACE: &str = "docforge.plugins.";

/// Shared installation context handed to plugin factories.
#[derive(Debug, Clone)]
pub struct PluginContext {
    /// Root of the installed rule files and themes.
    pub data_dir: PathBuf,
}

pub trait Plugin: Send + Sync {
    fn id(&self) -> &str;

    /// Oldest engine version this plugin runs on (semver).
    fn engine_min_version(&self) -> Option<&str> {
        None
    }

    fn as_config_fragment_provider(&self) -> Option<&dyn ConfigFragmentProvider> {
        None
    }

    fn as_document_fragment_provider(&self) -> Option<&dyn DocumentFragmentProvider> {
        None
    }

    fn as_config_preprocessor(&self) -> Option<&dyn ConfigPreprocessor> {
        None
    }

    fn as_rule_file_provider(&self) -> Option<&dyn RuleFileProvider> {
        None
    }

    fn as_rule_priority_voter(&self) -> Option<&dyn RulePriorityVoter> {
        None
    }

    fn as_document_processor(&self) -> Option<&dyn DocumentProcessor> {
        None
    }
}

/// Contributes top-level configuration fields.
pub trait ConfigFragmentProvider {
    fn config_fragment(&self) -> SchemaFragment;
}

/// Contributes fields accepted on every document entry.
pub trait DocumentFragmentProvider {
    fn document_fragment(&self) -> SchemaFragment;
}

/// Edits the raw, key-normalized configuration before it is validated.
/// `project_dir` is where relative project files are looked up.
pub trait ConfigPreprocessor {
    fn preprocess_config(&self, root: &mut Map<String, Value>, project_dir: &Path);
}

/// Rule files handed to the build engine.
pub trait RuleFileProvider {
    fn rule_files(&self) -> Vec<PathBuf>;
}

/// Votes on the priority of a rule; `None` abstains.
pub trait RulePriorityVoter {
    fn rule_priority(&self, rule: &str) -> Option<i64>;
}

/// Runs once per document after validation and dependency merging.
pub trait DocumentProcessor {
    fn process_document(&self, document: &mut Document, config: &Configuration) -> Result<(), ComposeError>;
}

/// Short plugin name used in rule prefixes: `docforge.plugins.tex` -> `tex`.
pub fn plugin_short_name(identifier: &str) -> String {
    identifier
        .strip_prefix(PLUGIN_NAMESPACE)
        .unwrap_or(identifier)
        .replace('.', "_")
}
