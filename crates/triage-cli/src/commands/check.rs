//! `triage check-config` command implementation.
//!
//! Validates the configuration, confirms every capability client can be
//! constructed, and reports settings that are legal but probably unintended.

use anyhow::Result;
use std::fmt;
use std::path::Path;
use triage_core::{CapabilityConfig, CapabilityMode, LedgerBackend, TriageConfig};
use triage_runtime::Capabilities;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Warning => write!(f, "WARN"),
            Level::Error => write!(f, "ERROR"),
        }
    }
}

/// A single check finding.
#[derive(Debug, Clone)]
pub struct CheckFinding {
    pub level: Level,
    /// Config section the finding refers to, e.g. "dispatch.backends.jira".
    pub section: String,
    pub message: String,
}

impl CheckFinding {
    fn error(section: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            section: section.into(),
            message: message.into(),
        }
    }

    fn warning(section: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            section: section.into(),
            message: message.into(),
        }
    }
}

pub fn run(config: &TriageConfig, path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => println!("Configuration: {}", p.display()),
        None => println!("Configuration: built-in defaults"),
    }
    print!("{}", describe(config));

    let findings = check(config);
    let errors = findings.iter().filter(|f| f.level == Level::Error).count();
    let warnings = findings.len() - errors;

    if !findings.is_empty() {
        println!();
        for finding in &findings {
            println!("  {} [{}]: {}", finding.level, finding.section, finding.message);
        }
    }

    println!();
    if errors > 0 {
        anyhow::bail!("Configuration has {} error(s), {} warning(s)", errors, warnings);
    }
    if warnings > 0 {
        println!("Configuration is valid with {} warning(s).", warnings);
    } else {
        println!("Configuration is valid.");
    }
    Ok(())
}

/// Run every check and return the findings, errors first.
pub fn check(config: &TriageConfig) -> Vec<CheckFinding> {
    let mut findings = Vec::new();

    if let Err(e) = config.validate() {
        findings.push(CheckFinding::error("config", e.to_string()));
        return findings;
    }
    if let Err(e) = Capabilities::from_config(config) {
        findings.push(CheckFinding::error("capabilities", e.to_string()));
    }

    if config.reasoner.client.mode == CapabilityMode::Disabled {
        findings.push(CheckFinding::warning(
            "reasoner",
            "reasoner disabled: every verdict comes from the rule table",
        ));
    }
    if config.dispatch.backends.is_empty() {
        findings.push(CheckFinding::warning(
            "dispatch",
            "no ticketing backends configured: outcomes will carry no tickets",
        ));
    } else if config.dispatch.backends.iter().all(|b| !b.enabled) {
        findings.push(CheckFinding::warning(
            "dispatch",
            "all ticketing backends are disabled",
        ));
    }
    if config.ledger.backend == LedgerBackend::Memory {
        findings.push(CheckFinding::warning(
            "ledger",
            "memory ledger: deduplication does not survive a restart",
        ));
    }

    let clients = [
        ("enrichment.log_search".to_string(), &config.enrichment.log_search),
        (
            "enrichment.asset_directory".to_string(),
            &config.enrichment.asset_directory,
        ),
        ("reasoner".to_string(), &config.reasoner.client),
    ]
    .into_iter()
    .chain(
        config
            .dispatch
            .backends
            .iter()
            .map(|b| (format!("dispatch.backends.{}", b.name), &b.client)),
    );
    for (section, client) in clients {
        if let Some(finding) = check_credentials(&section, client) {
            findings.push(finding);
        }
    }

    findings.sort_by(|a, b| b.level.cmp(&a.level));
    findings
}

fn check_credentials(section: &str, client: &CapabilityConfig) -> Option<CheckFinding> {
    if client.mode != CapabilityMode::Http {
        return None;
    }
    let var = client.credentials_env.as_deref()?;
    if client.bearer_token().is_none() {
        return Some(CheckFinding::warning(
            section,
            format!("credentials variable {} is not set; requests go unauthenticated", var),
        ));
    }
    None
}

fn mode_label(client: &CapabilityConfig) -> String {
    match client.mode {
        CapabilityMode::Mock => format!("mock ({:?})", client.behavior),
        CapabilityMode::Http => format!("http {}", client.endpoint.as_deref().unwrap_or("-")),
        CapabilityMode::Disabled => "disabled".to_string(),
    }
}

/// Human-readable overview of what the configuration selects.
pub fn describe(config: &TriageConfig) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "  log search:      {}\n",
        mode_label(&config.enrichment.log_search)
    ));
    out.push_str(&format!(
        "  asset directory: {}\n",
        mode_label(&config.enrichment.asset_directory)
    ));
    out.push_str(&format!(
        "  enrichment:      timeout {}s, window {}m, max {} lines\n",
        config.enrichment.timeout_seconds,
        config.enrichment.log_window_minutes,
        config.enrichment.max_log_lines
    ));
    out.push_str(&format!(
        "  reasoner:        {}, model {}, timeout {}s\n",
        mode_label(&config.reasoner.client),
        config.reasoner.model,
        config.reasoner.timeout_seconds
    ));

    let retry = &config.dispatch.retry;
    out.push_str(&format!(
        "  retry:           {} retries, backoff {}ms x{} (max {}ms)\n",
        retry.max_retries, retry.initial_backoff_ms, retry.multiplier, retry.max_backoff_ms
    ));
    for backend in &config.dispatch.backends {
        out.push_str(&format!(
            "  backend {:<8} {:?}, {}{}\n",
            format!("{}:", backend.name),
            backend.kind,
            mode_label(&backend.client),
            if backend.enabled { "" } else { " [disabled]" }
        ));
    }

    let ledger = match config.ledger.backend {
        LedgerBackend::Memory => "memory".to_string(),
        LedgerBackend::File => format!("file {}", config.ledger.directory.display()),
    };
    out.push_str(&format!("  ledger:          {}\n", ledger));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::{BackendConfig, MockBehavior};

    #[test]
    fn defaults_only_warn() {
        let findings = check(&TriageConfig::default());
        assert!(findings.iter().all(|f| f.level == Level::Warning));
        assert!(findings.iter().any(|f| f.section == "dispatch"));
        assert!(findings.iter().any(|f| f.section == "ledger"));
    }

    #[test]
    fn invalid_config_is_an_error() {
        let mut config = TriageConfig::default();
        config.dispatch.backends = vec![
            BackendConfig::new("jira", CapabilityConfig::default()),
            BackendConfig::new("jira", CapabilityConfig::default()),
        ];
        let findings = check(&config);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].level, Level::Error);
        assert!(run(&config, None).is_err());
    }

    #[test]
    fn missing_credentials_warn() {
        let mut config = TriageConfig::default();
        let mut client = CapabilityConfig::http("http://tickets.local");
        client.credentials_env = Some("TRIAGE_CHECK_TEST_UNSET_TOKEN".into());
        config.dispatch.backends = vec![BackendConfig::new("jira", client)];

        let findings = check(&config);
        assert!(findings
            .iter()
            .any(|f| f.section == "dispatch.backends.jira" && f.message.contains("not set")));
    }

    #[test]
    fn example_config_is_valid() {
        let yaml = include_str!("../../../../config/triage.example.yaml");
        let config = TriageConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.backend_names(), vec!["jira", "servicenow", "pagerduty"]);
        assert!(check(&config).iter().all(|f| f.level == Level::Warning));
    }

    #[test]
    fn describe_lists_backends() {
        let mut config = TriageConfig::default();
        let mut sn = BackendConfig::new("sn", CapabilityConfig::mock(MockBehavior::Succeed));
        sn.enabled = false;
        config.dispatch.backends = vec![sn];

        let text = describe(&config);
        assert!(text.contains("backend sn:"));
        assert!(text.contains("[disabled]"));
        assert!(text.contains("3 retries, backoff 200ms x2"));
    }
}
