//! Live capability clients over HTTP/JSON.
//!
//! Status mapping is shared across clients: 429 is rate limiting, 5xx and
//! transport timeouts are transient, any other 4xx is permanent.

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use triage_core::{
    Alert, AssetRecord, BackendConfig, CapabilityConfig, EnrichedContext, LogLine, TicketKind,
    Verdict,
};

use super::{
    AnalysisRequest, AssetDirectory, AssetLookupError, LogSearch, LogSearchError, Reasoner,
    ReasonerError, ScanHit, TicketError, TicketSink,
};
use crate::ticket::TicketDraft;

/// Failure class of an HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Failure {
    RateLimited,
    Transient(String),
    Permanent(String),
}

fn classify_status(status: StatusCode, body: &str) -> Failure {
    let detail = if body.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        let snippet: String = body.chars().take(200).collect();
        format!("HTTP {}: {}", status.as_u16(), snippet)
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        Failure::RateLimited
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        Failure::Transient(detail)
    } else {
        Failure::Permanent(detail)
    }
}

fn classify_transport(err: &reqwest::Error) -> Failure {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        Failure::Transient(err.to_string())
    } else {
        Failure::Permanent(err.to_string())
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

fn authorize(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

fn endpoint_of(config: &CapabilityConfig) -> String {
    config
        .endpoint
        .as_deref()
        .unwrap_or_default()
        .trim_end_matches('/')
        .to_string()
}

// ============================================================================
// Log search
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default, alias = "results")]
    logs: Vec<LogLine>,
}

#[derive(Debug, Deserialize)]
struct ScanResponse {
    #[serde(default, alias = "results")]
    hits: Vec<ScanHit>,
}

/// `POST {endpoint}/search` and `POST {endpoint}/scan` against a log search
/// gateway.
pub struct HttpLogSearch {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    query: String,
    max_lines: usize,
}

impl HttpLogSearch {
    pub fn new(
        config: &CapabilityConfig,
        query: impl Into<String>,
        max_lines: usize,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint_of(config),
            token: config.bearer_token(),
            query: query.into(),
            max_lines,
        })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, LogSearchError> {
        let request = self
            .client
            .post(format!("{}/{}", self.endpoint, path))
            .json(&body);
        let response = authorize(request, self.token.as_deref())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LogSearchError::Timeout
                } else {
                    LogSearchError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LogSearchError::Unavailable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| LogSearchError::Unavailable(format!("malformed response: {e}")))
    }
}

#[async_trait]
impl LogSearch for HttpLogSearch {
    async fn query(&self, host: &str, window: Duration) -> Result<Vec<LogLine>, LogSearchError> {
        let body = json!({
            "host": host,
            "window_minutes": window.as_secs() / 60,
            "query": self.query,
            "limit": self.max_lines,
        });
        let parsed: SearchResponse = self.post("search", body).await?;
        Ok(parsed.logs)
    }

    async fn scan(
        &self,
        query: &str,
        window: Duration,
        limit: usize,
    ) -> Result<Vec<ScanHit>, LogSearchError> {
        let body = json!({
            "window_minutes": window.as_secs() / 60,
            "query": query,
            "limit": limit,
        });
        let parsed: ScanResponse = self.post("scan", body).await?;
        Ok(parsed.hits)
    }
}

// ============================================================================
// Asset directory
// ============================================================================

/// `{endpoint}/assets/{host}` with `host` as a single escaped path segment.
fn asset_url(endpoint: &str, host: &str) -> Result<Url, AssetLookupError> {
    let invalid = || AssetLookupError::Unavailable(format!("invalid endpoint '{endpoint}'"));
    let mut url = Url::parse(endpoint).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|_| invalid())?
        .pop_if_empty()
        .extend(["assets", host]);
    Ok(url)
}

/// `GET {endpoint}/assets/{host}` against an asset inventory.
pub struct HttpAssetDirectory {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpAssetDirectory {
    pub fn new(config: &CapabilityConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint_of(config),
            token: config.bearer_token(),
        })
    }
}

#[async_trait]
impl AssetDirectory for HttpAssetDirectory {
    async fn lookup(&self, host: &str) -> Result<Option<AssetRecord>, AssetLookupError> {
        let url = asset_url(&self.endpoint, host)?;
        let request = self.client.get(url);
        let response = authorize(request, self.token.as_deref())
            .send()
            .await
            .map_err(|e| AssetLookupError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AssetLookupError::Unavailable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                text
            )));
        }

        response
            .json::<AssetRecord>()
            .await
            .map(Some)
            .map_err(|e| AssetLookupError::Unavailable(format!("malformed asset record: {e}")))
    }
}

// ============================================================================
// Reasoner
// ============================================================================

/// Completion endpoint for an LLM gateway.
///
/// Accepts either a structured `{"verdict": {...}}` reply or free text with
/// an embedded (possibly fenced) JSON object.
pub struct HttpReasoner {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    model: String,
}

impl HttpReasoner {
    pub fn new(
        config: &CapabilityConfig,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint_of(config),
            token: config.bearer_token(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl Reasoner for HttpReasoner {
    async fn analyze(&self, request: AnalysisRequest<'_>) -> Result<serde_json::Value, ReasonerError> {
        let body = json!({
            "model": self.model,
            "prompt": request.prompt,
            "alert_id": request.alert.alert_id,
            "response_format": "json",
        });

        let http = self.client.post(&self.endpoint).json(&body);
        let response = authorize(http, self.token.as_deref())
            .send()
            .await
            .map_err(|e| ReasonerError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match classify_status(status, &text) {
                Failure::RateLimited => ReasonerError::RateLimited,
                Failure::Transient(detail) => ReasonerError::Unavailable(detail),
                Failure::Permanent(detail) => ReasonerError::InvalidResponse(detail),
            });
        }

        let reply: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ReasonerError::InvalidResponse(e.to_string()))?;

        if let Some(verdict) = reply.get("verdict").filter(|v| v.is_object()) {
            return Ok(verdict.clone());
        }
        let text = ["text", "completion", "content"]
            .iter()
            .find_map(|k| reply.get(*k).and_then(|v| v.as_str()))
            .ok_or_else(|| ReasonerError::InvalidResponse("reply has no text".into()))?;
        extract_json(text)
    }
}

/// Pull a JSON object out of model output, tolerating markdown fences.
pub fn extract_json(text: &str) -> Result<serde_json::Value, ReasonerError> {
    let body = if let Some((_, rest)) = text.split_once("```json") {
        rest.split("```").next().unwrap_or(rest)
    } else if let Some((_, rest)) = text.split_once("```") {
        rest.split("```").next().unwrap_or(rest)
    } else {
        text
    };

    let body = body.trim();
    let candidate = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if end > start => &body[start..=end],
        _ => body,
    };

    serde_json::from_str(candidate)
        .map_err(|e| ReasonerError::InvalidResponse(format!("reply is not JSON: {e}")))
}

// ============================================================================
// Ticket sink
// ============================================================================

/// Ticketing backend reached over HTTP. The request body follows the
/// backend's [`TicketKind`].
pub struct HttpTicketSink {
    name: String,
    kind: TicketKind,
    project: Option<String>,
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpTicketSink {
    pub fn new(config: &BackendConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            name: config.name.clone(),
            kind: config.kind,
            project: config.project.clone(),
            client: build_client(config.timeout())?,
            endpoint: endpoint_of(&config.client),
            token: config.client.bearer_token(),
        })
    }
}

#[async_trait]
impl TicketSink for HttpTicketSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_ticket(
        &self,
        alert: &Alert,
        context: &EnrichedContext,
        verdict: &Verdict,
    ) -> Result<String, TicketError> {
        let draft = TicketDraft::compose(alert, context, verdict);
        let body = match self.kind {
            TicketKind::Issue => draft.issue_body(alert, self.project.as_deref()),
            TicketKind::Incident => draft.incident_body(alert),
        };

        let request = self.client.post(&self.endpoint).json(&body);
        let response = authorize(request, self.token.as_deref())
            .send()
            .await
            .map_err(|e| match classify_transport(&e) {
                Failure::Permanent(detail) => TicketError::Permanent(detail),
                Failure::Transient(detail) => TicketError::Transient(detail),
                Failure::RateLimited => TicketError::Transient("rate limited".into()),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match classify_status(status, &text) {
                Failure::RateLimited => TicketError::Transient("HTTP 429".into()),
                Failure::Transient(detail) => TicketError::Transient(detail),
                Failure::Permanent(detail) => TicketError::Permanent(detail),
            });
        }

        let reply: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TicketError::Permanent(format!("malformed response: {e}")))?;
        ticket_id(&reply)
            .ok_or_else(|| TicketError::Permanent("response carries no ticket ID".into()))
    }
}

/// External ID from common ticketing replies (`key`, `number`, `id`, ...).
fn ticket_id(reply: &serde_json::Value) -> Option<String> {
    let reply = reply.get("result").unwrap_or(reply);
    ["key", "number", "ticket_id", "id", "sys_id"]
        .iter()
        .find_map(|field| match reply.get(*field)? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            Failure::RateLimited
        );
        assert_eq!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, ""),
            Failure::Transient("HTTP 503".into())
        );
        assert_eq!(
            classify_status(StatusCode::BAD_REQUEST, "missing project"),
            Failure::Permanent("HTTP 400: missing project".into())
        );
    }

    #[test]
    fn extracts_fenced_json() {
        let text = "Here is my analysis:\n```json\n{\"priority\": \"High\"}\n```\nDone.";
        assert_eq!(extract_json(text).unwrap()["priority"], "High");

        let bare = "Sure. {\"priority\": \"Low\"} hope that helps";
        assert_eq!(extract_json(bare).unwrap()["priority"], "Low");

        assert!(matches!(
            extract_json("no json here"),
            Err(ReasonerError::InvalidResponse(_))
        ));
    }

    #[test]
    fn finds_ticket_ids_in_common_replies() {
        assert_eq!(ticket_id(&json!({"key": "OPS-7"})).as_deref(), Some("OPS-7"));
        assert_eq!(
            ticket_id(&json!({"result": {"number": "INC0010001"}})).as_deref(),
            Some("INC0010001")
        );
        assert_eq!(ticket_id(&json!({"id": 42})).as_deref(), Some("42"));
        assert_eq!(ticket_id(&json!({"status": "ok"})), None);
    }

    #[test]
    fn asset_url_escapes_the_host() {
        let url = asset_url("http://assets.local/api", "prod-web-01").unwrap();
        assert_eq!(url.as_str(), "http://assets.local/api/assets/prod-web-01");

        let url = asset_url("http://assets.local", "web 01/../admin?x=1#f").unwrap();
        assert_eq!(url.path(), "/assets/web%2001%2F..%2Fadmin%3Fx=1%23f");
        assert!(url.query().is_none());

        assert!(asset_url("not a url", "h1").is_err());
    }

    #[test]
    fn scan_response_tags_lines_with_hosts() {
        let body = json!({
            "results": [
                {"host": "prod-db-01", "level": "ERROR", "message": "pool exhausted"},
                {"message": "orphan line"}
            ]
        });
        let parsed: ScanResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.hits.len(), 2);
        assert_eq!(parsed.hits[0].host, "prod-db-01");
        assert_eq!(parsed.hits[0].line.message, "pool exhausted");
        assert_eq!(parsed.hits[1].host, "unknown");
    }
}
