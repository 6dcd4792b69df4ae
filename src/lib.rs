//! DocForge Core - Document Build Composer
//!
//! # The Four Guarantees
//! 1. One Closed Schema: every plugin field is known, nothing else passes
//! 2. Fail Fast: configuration errors abort before the engine starts
//! 3. Deterministic Rule Choice: user rules beat plugin rules beat core rules
//! 4. Dependencies Are Never Forgotten: recorded inputs only ever grow

pub mod error;
pub mod validation;
pub mod schema;
pub mod config;
pub mod setting;
pub mod hashing;
pub mod plugins;
pub mod registry;
pub mod compose;
pub mod priority;
pub mod recorder;
pub mod pipeline;

pub use error::{ComposeError, PluginLoadError, PluginLoadReason, ResolutionError, RuntimeDependencyError};
pub use validation::{Violation, ViolationRule};
pub use schema::{ComposedSchema, Field, FieldType, Record, SchemaFragment};
pub use config::{Configuration, Document};
pub use setting::DocumentSetting;
pub use hashing::{canonical_json, compute_fingerprint};
pub use plugins::Plugin;
pub use registry::{PluginCatalog, PluginRegistry};
pub use compose::{normalize_keys, Composed, ConfigComposer};
pub use priority::{rule_name, RuleOrder, RuleOrderSink, RulePriorityResolver};
pub use recorder::{DependencyGraphRecorder, DependencyObserver, JobEdges};
pub use pipeline::{BuildEngine, BuildPlan, BuildSession, PipelineError};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const REQUIRED_CONFIG_VERSION: i64 = 2;
