//! Rule table used when the reasoner cannot produce a verdict.

use crate::severity::Severity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Message keywords that raise severity to at least High.
    #[serde(default = "default_escalation_keywords")]
    pub escalation_keywords: Vec<String>,

    /// Environment names treated as production (case-insensitive).
    #[serde(default = "default_production_environments")]
    pub production_environments: Vec<String>,

    /// Priority assigned when the asset directory has no record of the host.
    #[serde(default = "default_unknown_host_priority")]
    pub unknown_host_priority: Severity,

    /// Assignment group when no owner team is known.
    #[serde(default = "default_assignment_group")]
    pub default_assignment_group: String,
}

impl FallbackConfig {
    pub fn is_production(&self, environment: &str) -> bool {
        self.production_environments
            .iter()
            .any(|e| e.eq_ignore_ascii_case(environment.trim()))
    }

    /// First escalation keyword found in `text`, if any.
    pub fn matched_keyword(&self, text: &str) -> Option<&str> {
        let text = text.to_ascii_lowercase();
        self.escalation_keywords
            .iter()
            .find(|k| !k.is_empty() && text.contains(&k.to_ascii_lowercase()))
            .map(String::as_str)
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            escalation_keywords: default_escalation_keywords(),
            production_environments: default_production_environments(),
            unknown_host_priority: default_unknown_host_priority(),
            default_assignment_group: default_assignment_group(),
        }
    }
}

fn default_escalation_keywords() -> Vec<String> {
    ["outage", "fatal", "panic", "data loss", "down"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_production_environments() -> Vec<String> {
    vec!["production".to_string(), "prod".to_string()]
}

fn default_unknown_host_priority() -> Severity {
    Severity::Medium
}

fn default_assignment_group() -> String {
    "Operations".to_string()
}
