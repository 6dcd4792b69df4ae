//! Plugin Registry - Ordered, Per-Build
//!
//! The catalog knows which plugin identifiers can be loaded. The registry
//! holds the plugins activated for one build, in registration order, and
//! fans hook calls out to them.

use indexmap::IndexMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{PluginLoadError, PluginLoadReason};
use crate::plugins::{
    BasePlugin, ConfigPreprocessor, DocumentProcessor, Plugin, PluginContext, RenderDagPlugin,
    TexPlugin, TrackedFiles, VcsPlugin, CONFIG_PLUGIN, RENDER_DAG_PLUGIN, TEX_PLUGIN, VCS_PLUGIN,
};
use crate::schema::SchemaFragment;
use crate::ENGINE_VERSION;

pub const DEFAULT_DATA_DIR: &str = "share/docforge";

pub type PluginFactory = Box<dyn Fn(&PluginContext) -> Result<Box<dyn Plugin>, String> + Send + Sync>;

/// Identifier -> factory table. Loading a plugin means resolving it here.
pub struct PluginCatalog {
    context: PluginContext,
    factories: IndexMap<String, PluginFactory>,
}

impl PluginCatalog {
    /// Catalog with nothing registered.
    pub fn empty(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            context: PluginContext {
                data_dir: data_dir.into(),
            },
            factories: IndexMap::new(),
        }
    }

    /// Catalog with the built-in plugins that need no host services.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self::empty(data_dir)
            .with_factory(CONFIG_PLUGIN, |cx| Ok(Box::new(BasePlugin::new(cx))))
            .with_factory(TEX_PLUGIN, |cx| Ok(Box::new(TexPlugin::new(cx))))
            .with_factory(RENDER_DAG_PLUGIN, |cx| Ok(Box::new(RenderDagPlugin::new(cx))))
    }

    pub fn with_factory<F>(mut self, identifier: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&PluginContext) -> Result<Box<dyn Plugin>, String> + Send + Sync + 'static,
    {
        self.register_factory(identifier, factory);
        self
    }

    pub fn register_factory<F>(&mut self, identifier: impl Into<String>, factory: F)
    where
        F: Fn(&PluginContext) -> Result<Box<dyn Plugin>, String> + Send + Sync + 'static,
    {
        self.factories.insert(identifier.into(), Box::new(factory));
    }

    /// Enables the version-control plugin backed by `files`.
    pub fn with_tracked_files(self, files: Arc<dyn TrackedFiles>) -> Self {
        self.with_factory(VCS_PLUGIN, move |_| Ok(Box::new(VcsPlugin::new(Arc::clone(&files)))))
    }

    /// Identifiers that can be loaded, in registration order.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn load(&self, identifier: &str) -> Result<Box<dyn Plugin>, PluginLoadError> {
        let fail = |reason| PluginLoadError {
            identifier: identifier.to_string(),
            reason,
        };
        let factory = self
            .factories
            .get(identifier)
            .ok_or_else(|| fail(PluginLoadReason::NotFound))?;
        let plugin = factory(&self.context).map_err(|e| fail(PluginLoadReason::Factory(e)))?;
        check_engine_version(plugin.as_ref()).map_err(fail)?;
        Ok(plugin)
    }
}

fn check_engine_version(plugin: &dyn Plugin) -> Result<(), PluginLoadReason> {
    let Some(required) = plugin.engine_min_version() else {
        return Ok(());
    };
    let engine_ver = semver::Version::parse(ENGINE_VERSION)
        .map_err(|_| PluginLoadReason::InvalidVersion(ENGINE_VERSION.to_string()))?;
    let min_ver = semver::Version::parse(required)
        .map_err(|_| PluginLoadReason::InvalidVersion(required.to_string()))?;

    if engine_ver < min_ver {
        return Err(PluginLoadReason::EngineTooOld {
            required: required.to_string(),
            current: ENGINE_VERSION.to_string(),
        });
    }
    Ok(())
}

impl Default for PluginCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("context", &self.context)
            .field("plugins", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The active plugins of one build. Never mutated once composition finishes.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `identifier` from the catalog and appends it. Registering the
    /// same identifier twice is a no-op.
    pub fn register(&mut self, catalog: &PluginCatalog, identifier: &str) -> Result<(), PluginLoadError> {
        if self.contains(identifier) {
            debug!(plugin = %identifier, "Plugin already registered");
            return Ok(());
        }
        let plugin = catalog.load(identifier)?;
        info!(plugin = %identifier, position = self.plugins.len(), "Plugin registered");
        self.plugins.push(plugin);
        Ok(())
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.plugins.iter().any(|p| p.id() == identifier)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Calls `hook` on every plugin in registration order and keeps the
    /// non-absent results. Plugins lacking the capability yield `None`.
    pub fn invoke_hook<'a, T, F>(&'a self, mut hook: F) -> Vec<T>
    where
        F: FnMut(&'a dyn Plugin) -> Option<T>,
    {
        let mut results = Vec::new();
        for plugin in &self.plugins {
            if let Some(result) = hook(plugin.as_ref()) {
                results.push(result);
            }
        }
        results
    }

    pub fn config_fragments(&self) -> Vec<SchemaFragment> {
        self.invoke_hook(|p| p.as_config_fragment_provider().map(|h| h.config_fragment()))
    }

    pub fn document_fragments(&self) -> Vec<SchemaFragment> {
        self.invoke_hook(|p| p.as_document_fragment_provider().map(|h| h.document_fragment()))
    }

    pub fn config_preprocessors(&self) -> Vec<&dyn ConfigPreprocessor> {
        self.invoke_hook(|p| p.as_config_preprocessor())
    }

    /// Rule files of every plugin, concatenated in registration order.
    pub fn rule_files(&self) -> Vec<PathBuf> {
        self.invoke_hook(|p| p.as_rule_file_provider().map(|h| h.rule_files()))
            .into_iter()
            .flatten()
            .collect()
    }

    pub fn rule_priority_votes(&self, rule: &str) -> Vec<i64> {
        self.invoke_hook(|p| p.as_rule_priority_voter().and_then(|h| h.rule_priority(rule)))
    }

    pub fn document_processors(&self) -> Vec<&dyn DocumentProcessor> {
        self.invoke_hook(|p| p.as_document_processor())
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry").field("plugins", &self.ids()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::RulePriorityVoter;

    struct Voter {
        id: &'static str,
        vote: Option<i64>,
    }

    impl RulePriorityVoter for Voter {
        fn rule_priority(&self, _rule: &str) -> Option<i64> {
            self.vote
        }
    }

    impl Plugin for Voter {
        fn id(&self) -> &str {
            self.id
        }

        fn as_rule_priority_voter(&self) -> Option<&dyn RulePriorityVoter> {
            Some(self)
        }
    }

    struct Futuristic;

    impl Plugin for Futuristic {
        fn id(&self) -> &str {
            "acme.future"
        }

        fn engine_min_version(&self) -> Option<&str> {
            Some("99.0.0")
        }
    }

    fn catalog() -> PluginCatalog {
        PluginCatalog::new("/data")
            .with_factory("acme.low", |_| Ok(Box::new(Voter { id: "acme.low", vote: Some(3) })))
            .with_factory("acme.none", |_| Ok(Box::new(Voter { id: "acme.none", vote: None })))
            .with_factory("acme.future", |_| Ok(Box::new(Futuristic)))
            .with_factory("acme.broken", |_| Err("missing system library".to_string()))
    }

    #[test]
    fn test_registration_order_and_dedup() {
        let catalog = catalog();
        let mut registry = PluginRegistry::new();
        for id in [CONFIG_PLUGIN, TEX_PLUGIN, "acme.low", TEX_PLUGIN] {
            registry.register(&catalog, id).unwrap();
        }
        assert_eq!(registry.ids(), vec![CONFIG_PLUGIN, TEX_PLUGIN, "acme.low"]);
    }

    #[test]
    fn test_hooks_skip_plugins_without_capability() {
        let catalog = catalog();
        let mut registry = PluginRegistry::new();
        for id in [CONFIG_PLUGIN, "acme.none", "acme.low"] {
            registry.register(&catalog, id).unwrap();
        }
        assert_eq!(registry.rule_priority_votes("anything"), vec![3]);
        assert_eq!(registry.config_fragments().len(), 1);
    }

    #[test]
    fn test_rule_files_follow_registration_order() {
        let catalog = catalog();
        let mut registry = PluginRegistry::new();
        for id in [CONFIG_PLUGIN, TEX_PLUGIN, RENDER_DAG_PLUGIN] {
            registry.register(&catalog, id).unwrap();
        }
        assert_eq!(
            registry.rule_files(),
            vec![
                PathBuf::from("/data/workflow/Rulefile"),
                PathBuf::from("/data/plugins/tex/workflow/Rulefile"),
                PathBuf::from("/data/plugins/render_dag/workflow/Rulefile"),
            ]
        );
    }

    #[test]
    fn test_catalog_lists_loadable_identifiers() {
        let catalog = catalog();
        let ids: Vec<&str> = catalog.identifiers().collect();
        assert_eq!(
            ids,
            vec![
                CONFIG_PLUGIN,
                TEX_PLUGIN,
                RENDER_DAG_PLUGIN,
                "acme.low",
                "acme.none",
                "acme.future",
                "acme.broken",
            ]
        );
        assert!(!ids.contains(&VCS_PLUGIN));
    }

    #[test]
    fn test_unknown_plugin_fails_to_load() {
        let err = PluginRegistry::new()
            .register(&catalog(), "acme.missing")
            .unwrap_err();
        assert!(matches!(err.reason, PluginLoadReason::NotFound));
        assert!(err.to_string().contains("acme.missing"));
    }

    #[test]
    fn test_factory_failure_is_carried() {
        let err = PluginRegistry::new()
            .register(&catalog(), "acme.broken")
            .unwrap_err();
        assert!(err.to_string().contains("missing system library"));
    }

    #[test]
    fn test_engine_version_gate() {
        let err = PluginRegistry::new()
            .register(&catalog(), "acme.future")
            .unwrap_err();
        assert!(matches!(err.reason, PluginLoadReason::EngineTooOld { .. }));
    }
}
