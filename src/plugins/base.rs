//! Base configuration fields every project has.

use serde_json::json;
use std::path::PathBuf;

use super::{
    ConfigFragmentProvider, DocumentFragmentProvider, Plugin, PluginContext, RuleFileProvider,
    CONFIG_PLUGIN, TEX_PLUGIN,
};
use crate::schema::{Field, FieldType, Record, SchemaFragment};

#[derive(Debug, Clone)]
pub struct BasePlugin {
    data_dir: PathBuf,
}

impl BasePlugin {
    pub fn new(context: &PluginContext) -> Self {
        Self {
            data_dir: context.data_dir.clone(),
        }
    }
}

fn path_list() -> Field {
    Field::with_default(FieldType::list(FieldType::Path), json!([]))
}

fn github_record() -> Record {
    Record::new()
        .field("owner", Field::required(FieldType::String))
        .field("repo", Field::required(FieldType::String))
}

fn dynamic_file_record() -> Record {
    Record::new()
        .field("script", Field::required(FieldType::Path))
        .field("command", Field::optional(FieldType::String))
        .field("conda", Field::optional(FieldType::Path))
        .field("input", path_list())
        .field("output", Field::with_default(FieldType::one_or_many(FieldType::Path), json!([])))
}

impl ConfigFragmentProvider for BasePlugin {
    fn config_fragment(&self) -> SchemaFragment {
        SchemaFragment::new(CONFIG_PLUGIN)
            .field("config_version", Field::required(FieldType::Integer))
            .field("working_directory", Field::optional(FieldType::Path))
            .field("verbose", Field::with_default(FieldType::Bool, json!(false)))
            .field(
                "plugins",
                Field::with_default(FieldType::list(FieldType::String), json!([TEX_PLUGIN])),
            )
            .field("disable_default_plugin", Field::with_default(FieldType::Bool, json!(false)))
            .field("dependencies", path_list())
            .field("rule_files", path_list())
            .field("github", Field::optional(FieldType::Record(github_record())))
            .field("conda", Field::optional(FieldType::Path))
            .field("static", path_list())
            .field(
                "dynamic",
                Field::with_default(FieldType::list(FieldType::Record(dynamic_file_record())), json!([])),
            )
            .field("scripts", Field::with_default(FieldType::map(FieldType::String), json!({})))
            .field(
                "datasets",
                Field::with_default(FieldType::map(FieldType::list(FieldType::Path)), json!({})),
            )
    }
}

impl DocumentFragmentProvider for BasePlugin {
    fn document_fragment(&self) -> SchemaFragment {
        SchemaFragment::new(CONFIG_PLUGIN)
            .field("path", Field::required(FieldType::Path))
            .field("dependencies", path_list())
    }
}

impl RuleFileProvider for BasePlugin {
    fn rule_files(&self) -> Vec<PathBuf> {
        vec![self.data_dir.join("workflow").join("Rulefile")]
    }
}

impl Plugin for BasePlugin {
    fn id(&self) -> &str {
        CONFIG_PLUGIN
    }

    fn as_config_fragment_provider(&self) -> Option<&dyn ConfigFragmentProvider> {
        Some(self)
    }

    fn as_document_fragment_provider(&self) -> Option<&dyn DocumentFragmentProvider> {
        Some(self)
    }

    fn as_rule_file_provider(&self) -> Option<&dyn RuleFileProvider> {
        Some(self)
    }
}
