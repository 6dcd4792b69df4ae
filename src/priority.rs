//! Rule Priority Resolver
//!
//! When several rules can produce the same file, user rules beat plugin
//! rules, which beat core rules. The engine only understands pairwise
//! "prefer A over B" directives, so the tiering is flattened into those.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::plugins::plugin_short_name;
use crate::registry::PluginRegistry;

pub const CORE_RULE_PREFIX: &str = "core__";
pub const PLUGIN_RULE_PREFIX: &str = "plugin_";

pub const CORE_PRIORITY: i64 = 0;
pub const PLUGIN_PRIORITY: i64 = 1;
pub const USER_PRIORITY: i64 = 100;

/// "When both can produce a file, run `preferred`, not `over`."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOrder {
    pub preferred: String,
    pub over: String,
}

/// The engine's production-ambiguity mechanism.
pub trait RuleOrderSink {
    fn ruleorder(&mut self, preferred: &str, over: &str);
}

impl RuleOrderSink for Vec<RuleOrder> {
    fn ruleorder(&mut self, preferred: &str, over: &str) {
        self.push(RuleOrder {
            preferred: preferred.to_string(),
            over: over.to_string(),
        });
    }
}

/// Priority from the rule name alone.
pub fn classify(rule: &str) -> i64 {
    if rule.starts_with(CORE_RULE_PREFIX) {
        CORE_PRIORITY
    } else if is_plugin_rule(rule) {
        PLUGIN_PRIORITY
    } else {
        USER_PRIORITY
    }
}

/// `plugin_<name>__<action>`; a bare `plugin_` prefix is a user rule.
fn is_plugin_rule(rule: &str) -> bool {
    rule.strip_prefix(PLUGIN_RULE_PREFIX)
        .and_then(|rest| rest.split_once("__"))
        .is_some_and(|(name, action)| !name.is_empty() && !action.is_empty())
}

/// Builds a namespaced rule name, e.g. `plugin_tex__compile__src_tex_ms_tex`.
pub fn rule_name(parts: &[&str], document: Option<&Path>, plugin: Option<&str>) -> String {
    let prefix = match plugin {
        None => "core".to_string(),
        Some(plugin) => format!("{PLUGIN_RULE_PREFIX}{}", plugin_short_name(plugin)),
    };
    let suffix = document
        .map(|d| format!("__{}", path_to_rule_name(d)))
        .unwrap_or_default();
    format!("{prefix}__{}{suffix}", parts.join("_"))
}

fn path_to_rule_name(path: &Path) -> String {
    path.to_string_lossy()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

pub struct RulePriorityResolver<'a> {
    registry: Option<&'a PluginRegistry>,
}

impl<'a> RulePriorityResolver<'a> {
    pub fn new(registry: &'a PluginRegistry) -> Self {
        Self {
            registry: Some(registry),
        }
    }

    /// Name-based classification only; no plugin votes.
    pub fn without_plugins() -> Self {
        Self { registry: None }
    }

    /// The lowest plugin vote if any plugin voted, otherwise the name tier.
    pub fn priority(&self, rule: &str) -> i64 {
        self.registry
            .and_then(|registry| registry.rule_priority_votes(rule).into_iter().min())
            .unwrap_or_else(|| classify(rule))
    }

    /// Emits a directive for every pair of rules with different priorities.
    /// Quadratic in the number of rules, which stays in the tens.
    pub fn fix_rule_order<S, R>(&self, rules: &[R], sink: &mut S) -> usize
    where
        S: RuleOrderSink + ?Sized,
        R: AsRef<str>,
    {
        let ranked: Vec<(&str, i64)> = rules
            .iter()
            .map(|r| (r.as_ref(), self.priority(r.as_ref())))
            .collect();

        let mut emitted = 0;
        for (n, (r1, p1)) in ranked.iter().enumerate() {
            for (r2, p2) in &ranked[n + 1..] {
                if p1 > p2 {
                    sink.ruleorder(r1, r2);
                } else if p1 < p2 {
                    sink.ruleorder(r2, r1);
                } else {
                    continue;
                }
                emitted += 1;
            }
        }
        debug!(rules = rules.len(), directives = emitted, "Rule order fixed");
        emitted
    }

    pub fn directives<R: AsRef<str>>(&self, rules: &[R]) -> Vec<RuleOrder> {
        let mut directives = Vec::new();
        self.fix_rule_order(rules, &mut directives);
        directives
    }

    /// Most preferred first; ties keep their input order. A linear
    /// alternative to the pairwise directives for large rule sets.
    pub fn total_order<R: AsRef<str>>(&self, rules: &[R]) -> Vec<(String, i64)> {
        let mut ranked: Vec<(String, i64)> = rules
            .iter()
            .map(|r| (r.as_ref().to_string(), self.priority(r.as_ref())))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_by_prefix() {
        assert_eq!(classify("core__render"), CORE_PRIORITY);
        assert_eq!(classify("plugin_tex__compile"), PLUGIN_PRIORITY);
        assert_eq!(classify("my_rule"), USER_PRIORITY);
    }

    #[test]
    fn test_plugin_prefix_needs_a_namespace() {
        assert_eq!(classify("plugin_helper"), USER_PRIORITY);
        assert_eq!(classify("plugin___compile"), USER_PRIORITY);
        assert_eq!(classify("plugin_tex__"), USER_PRIORITY);
        assert_eq!(classify("plugin_acme_extras__copy__ms_tex"), PLUGIN_PRIORITY);
    }

    #[test]
    fn test_rule_names() {
        assert_eq!(rule_name(&["render"], None, None), "core__render");
        assert_eq!(
            rule_name(&["compile"], None, Some("docforge.plugins.tex")),
            "plugin_tex__compile"
        );
        assert_eq!(
            rule_name(&["copy", "theme"], Some(Path::new("src/tex/ms.tex")), Some("acme.extras")),
            "plugin_acme_extras__copy_theme__src_tex_ms_tex"
        );
    }

    #[test]
    fn test_user_rule_preferred_over_plugin_and_core() {
        let resolver = RulePriorityResolver::without_plugins();
        let directives = resolver.directives(&["core__render", "plugin_tex__compile", "my_rule"]);
        assert!(directives.contains(&RuleOrder {
            preferred: "my_rule".into(),
            over: "core__render".into()
        }));
        assert!(directives.contains(&RuleOrder {
            preferred: "my_rule".into(),
            over: "plugin_tex__compile".into()
        }));
        assert!(directives.contains(&RuleOrder {
            preferred: "plugin_tex__compile".into(),
            over: "core__render".into()
        }));
        assert_eq!(directives.len(), 3);
    }

    #[test]
    fn test_equal_priorities_emit_nothing() {
        let resolver = RulePriorityResolver::without_plugins();
        assert!(resolver.directives(&["a", "b", "c"]).is_empty());
    }

    #[test]
    fn test_total_order_is_stable() {
        let resolver = RulePriorityResolver::without_plugins();
        let order = resolver.total_order(&["core__a", "x", "plugin_p__b", "y"]);
        let names: Vec<_> = order.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "plugin_p__b", "core__a"]);
    }
}
