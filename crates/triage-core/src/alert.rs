//! Incoming alerts.

use crate::severity::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An incoming signal describing a potential incident.
///
/// Immutable once received. `severity_hint` comes from the source system
/// and is not trusted as the final severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Identity, unique per source system. Dedup key.
    pub alert_id: String,

    /// Severity as reported by the source.
    #[serde(alias = "severity")]
    pub severity_hint: Severity,

    /// Free text description.
    #[serde(default)]
    pub message: String,

    /// Asset identifier the alert was raised for.
    pub host: String,

    /// When the alert was raised.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Open string mapping supplied by the source.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Reasons an alert is rejected before entering the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlertError {
    #[error("alert is missing an alert_id")]
    MissingId,

    #[error("alert {alert_id} is missing a host")]
    MissingHost { alert_id: String },
}

impl Alert {
    pub fn new(
        alert_id: impl Into<String>,
        host: impl Into<String>,
        severity_hint: Severity,
    ) -> Self {
        Self {
            alert_id: alert_id.into(),
            severity_hint,
            message: String::new(),
            host: host.into(),
            timestamp: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Check the identity fields the pipeline depends on.
    pub fn validate(&self) -> Result<(), AlertError> {
        if self.alert_id.trim().is_empty() {
            return Err(AlertError::MissingId);
        }
        if self.host.trim().is_empty() {
            return Err(AlertError::MissingHost {
                alert_id: self.alert_id.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_blank_identity() {
        let alert = Alert::new("  ", "h1", Severity::High);
        assert_eq!(alert.validate(), Err(AlertError::MissingId));

        let alert = Alert::new("a-1", "", Severity::High);
        assert_eq!(
            alert.validate(),
            Err(AlertError::MissingHost {
                alert_id: "a-1".to_string()
            })
        );

        assert!(Alert::new("a-1", "h1", Severity::Low).validate().is_ok());
    }

    #[test]
    fn deserializes_source_payload() {
        let alert: Alert = serde_json::from_str(
            r#"{
                "alert_id": "a-1",
                "severity": "high",
                "message": "disk almost full",
                "host": "prod-web-01",
                "timestamp": "2024-11-01T10:00:00Z",
                "metadata": {"region": "us-east-1"}
            }"#,
        )
        .unwrap();

        assert_eq!(alert.severity_hint, Severity::High);
        assert_eq!(alert.metadata.get("region").map(String::as_str), Some("us-east-1"));
    }

    #[test]
    fn missing_host_fails_to_deserialize() {
        let result = serde_json::from_str::<Alert>(r#"{"alert_id": "a-1", "severity": "Low"}"#);
        assert!(result.is_err());
    }
}
