//! Hand-off Tests
//!
//! A scripted engine stands in for the real one to check what a build
//! session hands over and what it records back.

use serde_json::json;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use docforge_core::{
    recorder::{EdgeSink, RecordingSink},
    registry::PluginCatalog,
    BuildEngine, BuildSession, Configuration, ConfigComposer, DependencyObserver, JobEdges,
    PipelineError, RuleOrder, RuleOrderSink,
};

#[derive(Default)]
struct ScriptedEngine {
    loaded: Vec<PathBuf>,
    rules: Vec<String>,
    ruleorder: Vec<RuleOrder>,
    observer: Option<Arc<dyn DependencyObserver>>,
    fail_loading: bool,
}

impl RuleOrderSink for ScriptedEngine {
    fn ruleorder(&mut self, preferred: &str, over: &str) {
        self.ruleorder.push(RuleOrder {
            preferred: preferred.into(),
            over: over.into(),
        });
    }
}

impl BuildEngine for ScriptedEngine {
    fn load_rule_files(&mut self, config: &Configuration, rule_files: &[PathBuf]) -> Result<(), String> {
        if self.fail_loading {
            return Err("syntax error in Rulefile".into());
        }
        self.loaded = rule_files.to_vec();
        self.rules = vec!["core__render".into(), "plugin_tex__compile".into()];
        for document in &config.documents {
            self.rules.push(format!("user_{}", document.path.display()));
        }
        Ok(())
    }

    fn rule_names(&self) -> Vec<String> {
        self.rules.clone()
    }

    fn set_dependency_observer(&mut self, observer: Arc<dyn DependencyObserver>) {
        self.observer = Some(observer);
    }
}

impl ScriptedEngine {
    fn schedule(&self, rule: &str, inputs: &[&str], outputs: &[&str]) {
        let job = JobEdges {
            rule: rule.into(),
            inputs: inputs.iter().map(PathBuf::from).collect(),
            outputs: outputs.iter().map(PathBuf::from).collect(),
        };
        if let Some(observer) = &self.observer {
            observer.job_inserted(&job);
        }
    }
}

fn session() -> BuildSession {
    let composer = ConfigComposer::new(PluginCatalog::new("/opt/docforge"));
    BuildSession::prepare(
        json!({
            "config_version": 2,
            "plugins": ["docforge.plugins.render_dag"],
            "rule_files": ["Rulefile.local"],
            "documents": ["ms.tex"],
        }),
        &composer,
    )
    .unwrap()
}

#[test]
fn rule_files_are_plugin_files_then_user_files() {
    let session = session();
    assert_eq!(
        session.plan().rule_files,
        vec![
            PathBuf::from("/opt/docforge/workflow/Rulefile"),
            PathBuf::from("/opt/docforge/plugins/tex/workflow/Rulefile"),
            PathBuf::from("/opt/docforge/plugins/render_dag/workflow/Rulefile"),
            PathBuf::from("Rulefile.local"),
        ]
    );
    assert_eq!(
        session.plan().plugins,
        vec!["docforge.config", "docforge.plugins.tex", "docforge.plugins.render_dag"]
    );
}

#[test]
fn attach_emits_rule_order_and_installs_recorder() {
    let session = session();
    let mut engine = ScriptedEngine::default();
    let directives = session.attach(&mut engine).unwrap();

    assert_eq!(engine.loaded, session.plan().rule_files);
    assert_eq!(engine.ruleorder, directives);
    assert!(directives.contains(&RuleOrder {
        preferred: "user_ms.tex".into(),
        over: "plugin_tex__compile".into(),
    }));
    assert!(directives.contains(&RuleOrder {
        preferred: "plugin_tex__compile".into(),
        over: "core__render".into(),
    }));

    engine.schedule("plugin_tex__compile", &["ms.tex"], &["ms.pdf"]);
    engine.schedule("plugin_tex__compile", &["fig1.pdf"], &["ms.pdf"]);
    engine.schedule("broken", &["x"], &[]);

    let recorder = session.recorder();
    assert_eq!(
        recorder.reverse_dependencies(Path::new("ms.pdf")),
        [PathBuf::from("fig1.pdf"), PathBuf::from("ms.tex")]
            .into_iter()
            .collect::<BTreeSet<_>>()
    );
    assert_eq!(recorder.len(), 1);
}

#[test]
fn engine_failure_surfaces() {
    let session = session();
    let mut engine = ScriptedEngine {
        fail_loading: true,
        ..Default::default()
    };
    let err = session.attach(&mut engine).unwrap_err();
    assert!(matches!(err, PipelineError::Engine(_)));
    assert!(engine.ruleorder.is_empty());
    assert!(engine.observer.is_none());
}

#[test]
fn composition_failure_prevents_session() {
    let composer = ConfigComposer::new(PluginCatalog::new("/opt/docforge"));
    let result = BuildSession::prepare(json!({"config_version": 2}), &composer);
    assert!(matches!(result, Err(PipelineError::Compose(_))));
}

#[test]
fn fingerprint_tracks_configuration_content() {
    let a = session();
    let b = session();
    assert_eq!(a.plan().config_fingerprint, b.plan().config_fingerprint);
    assert_ne!(a.plan().id, b.plan().id);
}

#[test]
fn wrapped_insertion_point_records_edges() {
    struct Inner(usize);
    impl EdgeSink for Inner {
        fn insert_job(&mut self, _job: JobEdges) {
            self.0 += 1;
        }
    }

    let session = session();
    let mut sink = RecordingSink::new(Inner(0), session.recorder().clone());
    sink.insert_job(JobEdges {
        rule: "core__render".into(),
        inputs: vec!["ms.tex".into()],
        outputs: vec!["ms.pdf".into()],
    });
    assert_eq!(sink.into_inner().0, 1);
    assert_eq!(session.recorder().reverse_dependencies(Path::new("ms.pdf")).len(), 1);
}
