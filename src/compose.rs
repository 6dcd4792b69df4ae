//! Configuration Composer - Single Entry Point
//!
//! normalize keys -> discover plugins -> register -> preprocess ->
//! compose schema -> version check -> validate -> resolve documents. Any failure aborts
//! with no partial state.

use indexmap::IndexSet;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::Configuration;
use crate::error::ComposeError;
use crate::plugins::{CONFIG_PLUGIN, TEX_PLUGIN};
use crate::registry::{PluginCatalog, PluginRegistry};
use crate::schema::{ComposedSchema, Field, FieldType, Record};
use crate::validation::{Violation, ViolationRule};
use crate::REQUIRED_CONFIG_VERSION;

/// A validated configuration together with the plugins that shaped it.
#[derive(Debug)]
pub struct Composed {
    pub config: Configuration,
    pub registry: PluginRegistry,
}

/// Rewrites every mapping key at every depth, `-` becoming `_`.
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k.replace('-', "_"), normalize_keys(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

pub struct ConfigComposer {
    catalog: PluginCatalog,
}

impl ConfigComposer {
    pub fn new(catalog: PluginCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    /// Reads a YAML configuration file. An empty file is an empty mapping.
    pub fn load(&self, path: &Path) -> Result<Composed, ComposeError> {
        let content = fs::read_to_string(path).map_err(|source| ComposeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw = if content.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_yaml::from_str::<Value>(&content).map_err(|source| ComposeError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        };
        let raw = if raw.is_null() { Value::Object(Map::new()) } else { raw };
        info!(path = %path.display(), "Loaded configuration file");
        let project_dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        self.compose_in(raw, project_dir)
    }

    /// Composes with the current directory as the project directory.
    pub fn compose(&self, raw: Value) -> Result<Composed, ComposeError> {
        self.compose_in(raw, Path::new("."))
    }

    /// Composes `raw`; plugins look up project files relative to `project_dir`.
    pub fn compose_in(&self, raw: Value, project_dir: &Path) -> Result<Composed, ComposeError> {
        let mut root = match normalize_keys(raw) {
            Value::Object(root) => root,
            other => {
                return Err(ComposeError::single(
                    Violation::new("", ViolationRule::WrongType, "Configuration must be a mapping")
                        .expected("mapping")
                        .actual(crate::schema::type_name(&other)),
                ))
            }
        };

        let plugins = discover_plugins(&root)?;
        root.insert("plugins".into(), json!(plugins));

        let mut registry = PluginRegistry::new();
        registry.register(&self.catalog, CONFIG_PLUGIN)?;
        for identifier in &plugins {
            registry.register(&self.catalog, identifier)?;
        }
        for preprocessor in registry.config_preprocessors() {
            preprocessor.preprocess_config(&mut root, project_dir);
        }

        let schema = compose_schema(&registry)?;
        check_config_version(&root)?;

        let mut violations = Vec::new();
        let validated = schema.validate(&Value::Object(root), "", &mut violations);
        if !violations.is_empty() {
            return Err(ComposeError::Validation(violations));
        }

        let mut config: Configuration = serde_json::from_value(validated)?;
        resolve_documents(&mut config, &registry)?;
        info!(
            documents = config.documents.len(),
            plugins = registry.len(),
            "Configuration composed"
        );
        Ok(Composed { config, registry })
    }
}

impl Default for ConfigComposer {
    fn default() -> Self {
        Self::new(PluginCatalog::default())
    }
}

fn discover_plugins(root: &Map<String, Value>) -> Result<Vec<String>, ComposeError> {
    let disabled = root
        .get("disable_default_plugin")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let mut plugins = match root.get("plugins") {
        None | Some(Value::Null) if disabled => Vec::new(),
        None | Some(Value::Null) => vec![TEX_PLUGIN.to_string()],
        Some(Value::Array(items)) => {
            let mut plugins = Vec::with_capacity(items.len());
            let mut violations = Vec::new();
            for (i, item) in items.iter().enumerate() {
                match item.as_str() {
                    Some(id) => plugins.push(id.to_string()),
                    None => violations.push(
                        Violation::new(format!("plugins[{i}]"), ViolationRule::WrongType, "Plugin identifiers are strings")
                            .expected("string")
                            .actual(crate::schema::type_name(item)),
                    ),
                }
            }
            if !violations.is_empty() {
                return Err(ComposeError::Validation(violations));
            }
            plugins
        }
        Some(other) => {
            return Err(ComposeError::single(
                Violation::new("plugins", ViolationRule::WrongType, "Wrong type")
                    .expected("list<string>")
                    .actual(crate::schema::type_name(other)),
            ))
        }
    };

    if !disabled && !plugins.iter().any(|p| p == TEX_PLUGIN) {
        debug!(plugin = TEX_PLUGIN, "Prepending default plugin");
        plugins.insert(0, TEX_PLUGIN.to_string());
    }
    Ok(plugins)
}

/// Merges every fragment into one closed configuration record whose
/// `documents` field is a list of the merged document record.
fn compose_schema(registry: &PluginRegistry) -> Result<Record, ComposeError> {
    let mut config_schema = ComposedSchema::compose(registry.config_fragments())?;
    let document_schema = ComposedSchema::compose(registry.document_fragments())?
        .into_record()
        .shorthand("path");
    config_schema.insert(
        CONFIG_PLUGIN,
        "documents".into(),
        Field::with_default(FieldType::list(FieldType::Record(document_schema)), json!([])),
    )?;
    Ok(config_schema.into_record())
}

/// A wrong version is reported on its own, before anything else is checked.
fn check_config_version(root: &Map<String, Value>) -> Result<(), ComposeError> {
    // Non-integers are left to field validation.
    let version = match root.get("config_version") {
        Some(Value::Number(n)) if n.as_i64() == Some(REQUIRED_CONFIG_VERSION) => return Ok(()),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
        _ => return Ok(()),
    };
    Err(ComposeError::single(
        Violation::new(
            "config_version",
            ViolationRule::ConfigVersion,
            format!(
                "Version {} of docforge requires configuration version {}, but the configuration specifies version {}",
                crate::ENGINE_VERSION,
                REQUIRED_CONFIG_VERSION,
                version
            ),
        )
        .expected(REQUIRED_CONFIG_VERSION.to_string())
        .actual(version),
    ))
}

fn resolve_documents(config: &mut Configuration, registry: &PluginRegistry) -> Result<(), ComposeError> {
    let mut documents = std::mem::take(&mut config.documents);

    let mut seen = IndexSet::new();
    let mut violations = Vec::new();
    for (i, document) in documents.iter_mut().enumerate() {
        if !seen.insert(document.path.clone()) {
            violations.push(
                Violation::new(format!("documents[{i}].path"), ViolationRule::DuplicateDocument, "Document listed more than once")
                    .actual(document.path.display().to_string()),
            );
        }
        let merged: IndexSet<PathBuf> = config
            .dependencies
            .iter()
            .cloned()
            .chain(document.dependencies.drain(..))
            .collect();
        document.dependencies = merged.into_iter().collect();
    }
    if !violations.is_empty() {
        return Err(ComposeError::Validation(violations));
    }

    let processors = registry.document_processors();
    for document in &mut documents {
        for processor in &processors {
            processor.process_document(document, config)?;
        }
    }

    if documents.is_empty() {
        return Err(ComposeError::single(Violation::new(
            "documents",
            ViolationRule::NoDocuments,
            "No documents were specified in the configuration file",
        )));
    }
    config.documents = documents;
    Ok(())
}
