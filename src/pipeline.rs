//! Build Session - Hand-off to the Build Engine
//!
//! A session is prepared once per build: composed configuration, plugin
//! registry, rule files and a dependency recorder. Attaching it to an
//! engine is the only way configuration reaches the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::compose::{Composed, ConfigComposer};
use crate::config::Configuration;
use crate::error::ComposeError;
use crate::priority::{RuleOrder, RuleOrderSink, RulePriorityResolver};
use crate::recorder::{DependencyGraphRecorder, DependencyObserver};
use crate::registry::PluginRegistry;
use crate::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// What the engine must offer for a session to drive it.
pub trait BuildEngine: RuleOrderSink {
    /// Load the rule files; the engine builds its rule set from them.
    fn load_rule_files(&mut self, config: &Configuration, rule_files: &[PathBuf]) -> Result<(), String>;

    fn rule_names(&self) -> Vec<String>;

    fn set_dependency_observer(&mut self, observer: Arc<dyn DependencyObserver>);
}

/// Summary of a prepared build, suitable for logging or writing next to outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildPlan {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub engine_version: String,
    pub config_fingerprint: String,
    pub plugins: Vec<String>,
    pub rule_files: Vec<PathBuf>,
}

pub struct BuildSession {
    plan: BuildPlan,
    config: Configuration,
    registry: PluginRegistry,
    recorder: Arc<DependencyGraphRecorder>,
}

impl BuildSession {
    pub fn prepare(raw: Value, composer: &ConfigComposer) -> Result<Self, PipelineError> {
        Self::from_composed(composer.compose(raw)?)
    }

    pub fn from_file(path: &Path, composer: &ConfigComposer) -> Result<Self, PipelineError> {
        Self::from_composed(composer.load(path)?)
    }

    fn from_composed(composed: Composed) -> Result<Self, PipelineError> {
        let Composed { config, registry } = composed;

        // Plugin rule files first, user rule files last.
        let mut rule_files = registry.rule_files();
        rule_files.extend(config.rule_files.iter().cloned());

        let plan = BuildPlan {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            engine_version: ENGINE_VERSION.to_string(),
            config_fingerprint: config.fingerprint()?,
            plugins: registry.ids().into_iter().map(String::from).collect(),
            rule_files,
        };
        info!(id = %plan.id, fingerprint = %plan.config_fingerprint, "Build session prepared");

        Ok(Self {
            plan,
            config,
            registry,
            recorder: Arc::new(DependencyGraphRecorder::new()),
        })
    }

    pub fn plan(&self) -> &BuildPlan {
        &self.plan
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn recorder(&self) -> &Arc<DependencyGraphRecorder> {
        &self.recorder
    }

    pub fn resolver(&self) -> RulePriorityResolver<'_> {
        RulePriorityResolver::new(&self.registry)
    }

    /// Hands configuration and rule files to the engine, emits the rule
    /// order for whatever rules it ended up with, and installs the
    /// recorder as its dependency observer.
    pub fn attach<E: BuildEngine>(&self, engine: &mut E) -> Result<Vec<RuleOrder>, PipelineError> {
        engine
            .load_rule_files(&self.config, &self.plan.rule_files)
            .map_err(PipelineError::Engine)?;

        let rules = engine.rule_names();
        let directives = self.resolver().directives(&rules);
        for directive in &directives {
            engine.ruleorder(&directive.preferred, &directive.over);
        }

        let observer: Arc<dyn DependencyObserver> = self.recorder.clone();
        engine.set_dependency_observer(observer);
        info!(rules = rules.len(), directives = directives.len(), "Engine attached");
        Ok(directives)
    }
}
