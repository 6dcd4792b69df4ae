//! Per-document settings with a three-level fallback:
//! explicit document value, then the matching entry of a
//! `[{document, <value_key>}]` list, then a single default.

use serde_json::Value;
use std::path::Path;

use crate::error::ResolutionError;

#[derive(Debug, Clone)]
pub struct DocumentSetting {
    name: String,
    value_key: String,
    default: Option<Value>,
}

impl DocumentSetting {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_key: "value".into(),
            default: None,
        }
    }

    /// Key holding the value inside each list entry. Defaults to `value`.
    pub fn value_key(mut self, key: impl Into<String>) -> Self {
        self.value_key = key.into();
        self
    }

    pub fn default_value(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn resolve(
        &self,
        document: &Path,
        explicit: Option<&Value>,
        global: Option<&Value>,
    ) -> Result<Value, ResolutionError> {
        if let Some(value) = explicit.filter(|v| !v.is_null()) {
            return Ok(value.clone());
        }

        match global.filter(|v| !v.is_null()) {
            Some(Value::Array(entries)) => match self.lookup(document, entries)? {
                Some(value) => Ok(value),
                None => self.fallback(document, "no entry lists this document and there is no default"),
            },
            Some(value) => Ok(value.clone()),
            None => self.fallback(document, "no value was given and there is no default"),
        }
    }

    fn lookup(&self, document: &Path, entries: &[Value]) -> Result<Option<Value>, ResolutionError> {
        let mut found = None;
        for (index, entry) in entries.iter().enumerate() {
            let listed = entry
                .get("document")
                .and_then(Value::as_str)
                .ok_or_else(|| self.error(document, format!("entry {index} has no 'document' path")))?;
            if Path::new(listed) != document {
                continue;
            }
            if found.is_some() {
                return Err(self.error(document, "document is listed more than once".to_string()));
            }
            let value = entry
                .get(&self.value_key)
                .ok_or_else(|| self.error(document, format!("entry {index} has no '{}'", self.value_key)))?;
            found = Some(value.clone());
        }
        Ok(found)
    }

    fn fallback(&self, document: &Path, reason: &str) -> Result<Value, ResolutionError> {
        self.default
            .clone()
            .ok_or_else(|| self.error(document, reason.to_string()))
    }

    fn error(&self, document: &Path, reason: String) -> ResolutionError {
        ResolutionError {
            setting: self.name.clone(),
            document: document.to_path_buf(),
            reason,
        }
    }
}
