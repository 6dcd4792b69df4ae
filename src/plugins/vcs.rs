//! Version-control plugin: tracked files next to a document become its dependencies.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{DocumentProcessor, Plugin, VCS_PLUGIN};
use crate::config::{Configuration, Document};
use crate::error::{ComposeError, ResolutionError};

/// Source of the files tracked by version control, relative to the project root.
pub trait TrackedFiles: Send + Sync {
    fn list_files(&self) -> Result<Vec<PathBuf>, String>;
}

impl TrackedFiles for Vec<PathBuf> {
    fn list_files(&self) -> Result<Vec<PathBuf>, String> {
        Ok(self.clone())
    }
}

#[derive(Clone)]
pub struct VcsPlugin {
    files: Arc<dyn TrackedFiles>,
}

impl VcsPlugin {
    pub fn new(files: Arc<dyn TrackedFiles>) -> Self {
        Self { files }
    }
}

fn files_below<'a>(files: &'a [PathBuf], document: &'a Path) -> impl Iterator<Item = &'a PathBuf> {
    let parent = document.parent().unwrap_or_else(|| Path::new(""));
    files
        .iter()
        .filter(move |f| f.starts_with(parent) && f.as_path() != document)
}

impl DocumentProcessor for VcsPlugin {
    fn process_document(&self, document: &mut Document, _config: &Configuration) -> Result<(), ComposeError> {
        let files = self.files.list_files().map_err(|reason| ResolutionError {
            setting: "tracked files".into(),
            document: document.path.clone(),
            reason: format!("could not list files tracked by version control: {reason}"),
        })?;
        let below: Vec<PathBuf> = files_below(&files, &document.path).cloned().collect();
        for file in below {
            document.add_dependency(file);
        }
        Ok(())
    }
}

impl Plugin for VcsPlugin {
    fn id(&self) -> &str {
        VCS_PLUGIN
    }

    fn as_document_processor(&self) -> Option<&dyn DocumentProcessor> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_below_document_directory() {
        let files: Vec<PathBuf> = ["src/tex/ms.tex", "src/tex/figures/a.pdf", "src/scripts/b.py"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let below: Vec<_> = files_below(&files, Path::new("src/tex/ms.tex")).collect();
        assert_eq!(below, vec![&PathBuf::from("src/tex/figures/a.pdf")]);
    }

    #[test]
    fn test_top_level_document_sees_everything_else() {
        let files: Vec<PathBuf> = ["ms.tex", "refs.bib"].iter().map(PathBuf::from).collect();
        let below: Vec<_> = files_below(&files, Path::new("ms.tex")).collect();
        assert_eq!(below, vec![&PathBuf::from("refs.bib")]);
    }
}
