//! TeX rendering plugin - the default document plugin.
//!
//! Adds the `tex` section, per-document build switches and themes, and
//! fills each document's artifact list. `ms.tex` and `src/tex/ms.tex` are
//! added as documents when they exist and are not already listed.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{
    ConfigFragmentProvider, ConfigPreprocessor, DocumentFragmentProvider, DocumentProcessor, Plugin,
    PluginContext, RuleFileProvider, TEX_PLUGIN,
};
use crate::config::{Configuration, Document};
use crate::error::{ComposeError, ResolutionError};
use crate::schema::{Field, FieldType, Record, SchemaFragment};
use crate::setting::DocumentSetting;

pub const BUILTIN_THEMES: &[&str] = &["base"];
pub const DEFAULT_THEME: &str = "base";
/// Picked up automatically when present in the project directory.
pub const DEFAULT_DOCUMENTS: &[&str] = &["ms.tex", "src/tex/ms.tex"];

/// A resolved theme: a directory plus free-form options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub path: PathBuf,
    #[serde(default)]
    pub options: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct TexSection {
    #[serde(default)]
    theme: Option<Value>,
    #[serde(default = "default_true")]
    synctex: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TexSection {
    fn default() -> Self {
        Self {
            theme: None,
            synctex: true,
        }
    }
}

fn theme_options() -> Field {
    Field::with_default(FieldType::map(FieldType::Any), json!({}))
}

/// A theme given by built-in name (bare string or `{name}`) or by directory.
pub fn theme_spec_type() -> FieldType {
    FieldType::Union(vec![
        FieldType::Record(
            Record::new()
                .field("name", Field::required(FieldType::String))
                .field("options", theme_options())
                .shorthand("name"),
        ),
        FieldType::Record(
            Record::new()
                .field("path", Field::required(FieldType::Path))
                .field("options", theme_options()),
        ),
    ])
}

fn theme_setting_type() -> FieldType {
    let entry = Record::new()
        .field("document", Field::required(FieldType::Path))
        .field("theme", Field::required(theme_spec_type()));
    FieldType::Union(vec![theme_spec_type(), FieldType::list(FieldType::Record(entry))])
}

#[derive(Debug, Clone)]
pub struct TexPlugin {
    data_dir: PathBuf,
}

impl TexPlugin {
    pub fn new(context: &PluginContext) -> Self {
        Self {
            data_dir: context.data_dir.join("plugins").join("tex"),
        }
    }

    fn themes_dir(&self) -> PathBuf {
        self.data_dir.join("themes")
    }

    pub fn resolve_theme(&self, document: &Path, spec: &Value) -> Result<Theme, ResolutionError> {
        let error = |reason: String| ResolutionError {
            setting: "theme".into(),
            document: document.to_path_buf(),
            reason,
        };
        let options = spec
            .get("options")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let name = match spec {
            Value::String(name) => Some(name.as_str()),
            Value::Object(object) => object.get("name").and_then(Value::as_str),
            _ => None,
        };
        if let Some(name) = name {
            if !BUILTIN_THEMES.contains(&name) {
                return Err(error(format!("theme '{name}' not found")));
            }
            return Ok(Theme {
                path: self.themes_dir().join(name),
                options,
            });
        }

        match spec.get("path").and_then(Value::as_str) {
            Some(path) => Ok(Theme {
                path: PathBuf::from(path),
                options,
            }),
            None => Err(error("theme needs a name or a path".into())),
        }
    }
}

impl ConfigFragmentProvider for TexPlugin {
    fn config_fragment(&self) -> SchemaFragment {
        let section = Record::new()
            .field("theme", Field::optional(theme_setting_type()))
            .field("synctex", Field::with_default(FieldType::Bool, json!(true)));
        SchemaFragment::new(TEX_PLUGIN).field(
            "tex",
            Field::with_default(FieldType::Record(section), json!({"theme": null, "synctex": true})),
        )
    }
}

impl ConfigPreprocessor for TexPlugin {
    fn preprocess_config(&self, root: &mut Map<String, Value>, project_dir: &Path) {
        let declared: Vec<&str> = match root.get("documents") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(path) => Some(path.as_str()),
                    Value::Object(entry) => entry.get("path").and_then(Value::as_str),
                    _ => None,
                })
                .collect(),
            Some(_) => return,
        };

        let mut found = Vec::new();
        for candidate in DEFAULT_DOCUMENTS {
            if declared.contains(candidate) || !project_dir.join(candidate).is_file() {
                continue;
            }
            debug!(document = *candidate, "Found default document; adding to document list");
            found.push(Value::from(*candidate));
        }
        if found.is_empty() {
            return;
        }

        match root.get_mut("documents") {
            Some(Value::Array(items)) => items.extend(found),
            _ => {
                root.insert("documents".into(), Value::Array(found));
            }
        }
    }
}

impl DocumentFragmentProvider for TexPlugin {
    fn document_fragment(&self) -> SchemaFragment {
        SchemaFragment::new(TEX_PLUGIN)
            .field("build_tex", Field::optional(FieldType::Bool))
            .field("synctex", Field::optional(FieldType::Bool))
            .field("theme", Field::optional(theme_spec_type()))
    }
}

impl RuleFileProvider for TexPlugin {
    fn rule_files(&self) -> Vec<PathBuf> {
        vec![self.data_dir.join("workflow").join("Rulefile")]
    }
}

impl DocumentProcessor for TexPlugin {
    fn process_document(&self, document: &mut Document, config: &Configuration) -> Result<(), ComposeError> {
        let section: TexSection = config.extension("tex").unwrap_or_default();

        // A list that leaves a document out has no fallback.
        let mut setting = DocumentSetting::new("theme").value_key("theme");
        if section.theme.is_none() {
            setting = setting.default_value(json!(DEFAULT_THEME));
        }
        let spec = setting.resolve(&document.path, document.raw_extension("theme"), section.theme.as_ref())?;
        let theme = self.resolve_theme(&document.path, &spec)?;
        document.set_extension("theme", serde_json::to_value(&theme)?);

        let build_tex = document
            .extension::<bool>("build_tex")
            .unwrap_or_else(|| document.path.extension().map_or(false, |e| e == "tex"));
        let synctex = document.extension::<bool>("synctex").unwrap_or(section.synctex);
        document.set_extension("build_tex", Value::Bool(build_tex));
        document.set_extension("synctex", Value::Bool(synctex));

        if build_tex {
            let pdf = document.path.with_extension("pdf");
            document.add_artifact(pdf);
            if synctex {
                let synctex_file = document.path.with_extension("synctex.gz");
                document.add_artifact(synctex_file);
            }
        }
        debug!(document = %document.path.display(), build_tex, synctex, "Resolved TeX document");
        Ok(())
    }
}

impl Plugin for TexPlugin {
    fn id(&self) -> &str {
        TEX_PLUGIN
    }

    fn as_config_fragment_provider(&self) -> Option<&dyn ConfigFragmentProvider> {
        Some(self)
    }

    fn as_document_fragment_provider(&self) -> Option<&dyn DocumentFragmentProvider> {
        Some(self)
    }

    fn as_config_preprocessor(&self) -> Option<&dyn ConfigPreprocessor> {
        Some(self)
    }

    fn as_rule_file_provider(&self) -> Option<&dyn RuleFileProvider> {
        Some(self)
    }

    fn as_document_processor(&self) -> Option<&dyn DocumentProcessor> {
        Some(self)
    }
}
