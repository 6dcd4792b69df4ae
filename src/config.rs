//! Configuration Model
//!
//! Typed view of a validated configuration. Fields contributed by
//! plugins stay as JSON values under `extensions`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::hashing::compute_fingerprint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub config_version: i64,
    pub working_directory: Option<PathBuf>,
    pub verbose: bool,
    pub plugins: Vec<String>,
    pub disable_default_plugin: bool,
    /// Global dependencies shared by every document.
    pub dependencies: Vec<PathBuf>,
    pub rule_files: Vec<PathBuf>,
    pub github: Option<GitHubInfo>,
    pub conda: Option<PathBuf>,
    #[serde(rename = "static")]
    pub static_files: Vec<PathBuf>,
    pub dynamic: Vec<DynamicFile>,
    pub scripts: BTreeMap<String, String>,
    pub datasets: BTreeMap<String, Vec<PathBuf>>,
    pub documents: Vec<Document>,
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl Configuration {
    pub fn extension<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        decode_extension(&self.extensions, key)
    }

    pub fn document(&self, path: impl AsRef<Path>) -> Option<&Document> {
        let path = path.as_ref();
        self.documents.iter().find(|d| d.path == path)
    }

    /// Stable content hash; equal configurations hash equally.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        compute_fingerprint(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubInfo {
    pub owner: String,
    pub repo: String,
}

/// A file produced by a user script rather than checked in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicFile {
    pub script: PathBuf,
    pub command: Option<String>,
    pub conda: Option<PathBuf>,
    pub input: Vec<PathBuf>,
    pub output: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub path: PathBuf,
    #[serde(default)]
    pub dependencies: Vec<PathBuf>,
    #[serde(default)]
    pub artifacts: Vec<PathBuf>,
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl Document {
    pub fn extension<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        decode_extension(&self.extensions, key)
    }

    pub fn raw_extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key).filter(|v| !v.is_null())
    }

    pub fn set_extension(&mut self, key: impl Into<String>, value: Value) {
        self.extensions.insert(key.into(), value);
    }

    /// Append unless already present, keeping first-seen order.
    pub fn add_dependency(&mut self, path: PathBuf) -> bool {
        push_unique(&mut self.dependencies, path)
    }

    pub fn add_artifact(&mut self, path: PathBuf) -> bool {
        push_unique(&mut self.artifacts, path)
    }
}

fn push_unique(list: &mut Vec<PathBuf>, path: PathBuf) -> bool {
    if list.contains(&path) {
        return false;
    }
    list.push(path);
    true
}

fn decode_extension<T: DeserializeOwned>(extensions: &BTreeMap<String, Value>, key: &str) -> Option<T> {
    extensions
        .get(key)
        .filter(|v| !v.is_null())
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_dependencies_stay_unique() {
        let mut doc = Document {
            path: "ms.tex".into(),
            dependencies: vec!["a.cls".into()],
            artifacts: vec![],
            extensions: BTreeMap::new(),
        };
        assert!(!doc.add_dependency("a.cls".into()));
        assert!(doc.add_dependency("fig.pdf".into()));
        assert_eq!(doc.dependencies, vec![PathBuf::from("a.cls"), PathBuf::from("fig.pdf")]);
    }

    #[test]
    fn test_extension_lookup_skips_null() {
        let mut doc = Document {
            path: "ms.tex".into(),
            dependencies: vec![],
            artifacts: vec![],
            extensions: BTreeMap::new(),
        };
        doc.set_extension("build_tex", Value::Null);
        assert_eq!(doc.extension::<bool>("build_tex"), None);
        doc.set_extension("build_tex", json!(false));
        assert_eq!(doc.extension::<bool>("build_tex"), Some(false));
    }
}
