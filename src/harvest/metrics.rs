//! Request counters and the capped request/response archive

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// Running counters for every request of the session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestMetrics {
    pub total_requests: u64,
    pub total_response_time_ms: u64,
    pub avg_response_ms: u64,
    pub bytes_downloaded: u64,
    pub slow_responses: u64,
    pub rate_limit_pauses: u64,
    pub last_response_ms: u64,
    /// Status code as text, or `timeout` / `error` for failed transports
    pub last_status: Option<String>,
    pub last_request_url: Option<String>,
    pub last_request_method: Option<String>,
    pub last_request_at: Option<DateTime<Utc>>,
}

impl RequestMetrics {
    /// Folds one finished request into the counters
    pub fn record(
        &mut self,
        method: &str,
        url: &str,
        status: &str,
        elapsed: Duration,
        bytes: usize,
        slow: bool,
    ) {
        let elapsed_ms = elapsed.as_millis() as u64;
        self.total_requests += 1;
        self.total_response_time_ms += elapsed_ms;
        self.avg_response_ms = self.total_response_time_ms / self.total_requests;
        self.bytes_downloaded += bytes as u64;
        if slow {
            self.slow_responses += 1;
        }
        self.last_response_ms = elapsed_ms;
        self.last_status = Some(status.to_string());
        self.last_request_url = Some(url.to_string());
        self.last_request_method = Some(method.to_string());
        self.last_request_at = Some(Utc::now());
    }
}

/// One archived exchange, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedExchange {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub method: String,
    pub url: String,
    pub request_headers: BTreeMap<String, String>,
    pub request_body: Option<String>,
    /// HTTP status, or None when the transport failed
    pub status: Option<u16>,
    pub response_headers: BTreeMap<String, String>,
    pub body_size: usize,
    pub body_text: Option<String>,
    pub error: Option<String>,
}

/// Cuts archived text at `limit` characters, marking the cut
pub fn truncate_body(body: &str, limit: usize) -> String {
    match body.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}\n/* truncated */", &body[..cut]),
        None => body.to_string(),
    }
}

/// Replaces the values of credential fields in a form body
pub fn redact_form(body: &str) -> String {
    body.split('&')
        .map(|pair| match pair.split_once('=') {
            Some((name, _)) if name.eq_ignore_ascii_case("password") => {
                format!("{}=[REDACTED]", name)
            }
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Pushes an exchange, evicting the oldest entries past `capacity`
pub fn push_capped<T>(archive: &mut VecDeque<T>, exchange: T, capacity: usize) {
    if capacity == 0 {
        return;
    }
    archive.push_back(exchange);
    while archive.len() > capacity {
        archive.pop_front();
    }
}
