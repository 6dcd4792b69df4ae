//! Renders the recorded build graph. Contributes its config section and rule file.

use serde_json::json;
use std::path::PathBuf;

use super::{ConfigFragmentProvider, Plugin, PluginContext, RuleFileProvider, RENDER_DAG_PLUGIN};
use crate::schema::{Field, FieldType, Record, SchemaFragment};

#[derive(Debug, Clone)]
pub struct RenderDagPlugin {
    data_dir: PathBuf,
}

impl RenderDagPlugin {
    pub fn new(context: &PluginContext) -> Self {
        Self {
            data_dir: context.data_dir.join("plugins").join("render_dag"),
        }
    }
}

impl ConfigFragmentProvider for RenderDagPlugin {
    fn config_fragment(&self) -> SchemaFragment {
        let section = Record::new()
            .field("output", Field::with_default(FieldType::Path, json!("dag.pdf")))
            .field("simplify", Field::with_default(FieldType::Bool, json!(false)));
        SchemaFragment::new(RENDER_DAG_PLUGIN).field(
            "render_dag",
            Field::with_default(FieldType::Record(section), json!({"output": "dag.pdf", "simplify": false})),
        )
    }
}

impl RuleFileProvider for RenderDagPlugin {
    fn rule_files(&self) -> Vec<PathBuf> {
        vec![self.data_dir.join("workflow").join("Rulefile")]
    }
}

impl Plugin for RenderDagPlugin {
    fn id(&self) -> &str {
        RENDER_DAG_PLUGIN
    }

    fn as_config_fragment_provider(&self) -> Option<&dyn ConfigFragmentProvider> {
        Some(self)
    }

    fn as_rule_file_provider(&self) -> Option<&dyn RuleFileProvider> {
        Some(self)
    }
}
