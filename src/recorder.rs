//! Dependency Graph Recorder
//!
//! The engine reports every job it schedules. For each output we keep the
//! union of all inputs ever reported, because the engine may rebuild its
//! graph several times per process and must not forget earlier inputs.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use crate::error::RuntimeDependencyError;
use crate::hashing::canonical_json;

/// One job as the engine sees it: a rule with its resolved file sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEdges {
    pub rule: String,
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
}

/// Extension point the engine calls whenever it assigns inputs to outputs.
pub trait DependencyObserver: Send + Sync {
    fn job_inserted(&self, job: &JobEdges);
}

pub type DependencyMap = BTreeMap<PathBuf, BTreeSet<PathBuf>>;

#[derive(Debug, Default)]
pub struct DependencyGraphRecorder {
    edges: Mutex<DependencyMap>,
}

impl DependencyGraphRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unions the job's inputs into every output's entry. The job is checked
    /// in full before anything is stored.
    pub fn record(&self, job: &JobEdges) -> Result<usize, RuntimeDependencyError> {
        if job.outputs.is_empty() {
            return Err(RuntimeDependencyError::NoOutputs {
                rule: job.rule.clone(),
            });
        }
        let empty = |role| RuntimeDependencyError::EmptyPath {
            rule: job.rule.clone(),
            role,
        };
        if job.outputs.iter().any(|p| p.as_os_str().is_empty()) {
            return Err(empty("output"));
        }
        if job.inputs.iter().any(|p| p.as_os_str().is_empty()) {
            return Err(empty("input"));
        }

        let mut edges = self.edges.lock();
        for output in &job.outputs {
            edges
                .entry(output.clone())
                .or_default()
                .extend(job.inputs.iter().cloned());
        }
        Ok(job.outputs.len())
    }

    pub fn reverse_dependencies(&self, output: &Path) -> BTreeSet<PathBuf> {
        self.edges.lock().get(output).cloned().unwrap_or_default()
    }

    /// Outputs that were built from `input`.
    pub fn dependents_of(&self, input: &Path) -> BTreeSet<PathBuf> {
        self.edges
            .lock()
            .iter()
            .filter(|(_, inputs)| inputs.contains(input))
            .map(|(output, _)| output.clone())
            .collect()
    }

    pub fn snapshot(&self) -> DependencyMap {
        self.edges.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.edges.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.lock().is_empty()
    }

    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        canonical_json(&self.snapshot())
    }
}

impl DependencyObserver for DependencyGraphRecorder {
    fn job_inserted(&self, job: &JobEdges) {
        if let Err(e) = self.record(job) {
            warn!(rule = %job.rule, error = %e, "Skipping malformed dependency edge");
        }
    }
}

/// The engine's single edge-insertion call site.
pub trait EdgeSink {
    fn insert_job(&mut self, job: JobEdges);
}

/// Wraps an engine's insertion point so every job is observed before it
/// reaches the engine.
pub struct RecordingSink<S> {
    inner: S,
    observer: Arc<dyn DependencyObserver>,
}

impl<S: EdgeSink> RecordingSink<S> {
    pub fn new(inner: S, observer: Arc<dyn DependencyObserver>) -> Self {
        Self { inner, observer }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: EdgeSink> EdgeSink for RecordingSink<S> {
    fn insert_job(&mut self, job: JobEdges) {
        self.observer.job_inserted(&job);
        self.inner.insert_job(job);
    }
}
