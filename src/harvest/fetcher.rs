//! HTTP session client for the portal
//!
//! This module handles every HTTP exchange with the portal, including:
//! - Building a cookie-preserving client with a browser-like identity
//! - Per-request timeouts classified into timeout and network errors
//! - Running request metrics and the capped request archive
//! - The slow-response breaker cooldown, applied transparently

use crate::config::{ClientConfig, PortalConfig};
use crate::harvest::breaker::SlowResponseBreaker;
use crate::harvest::metrics::{redact_form, truncate_body, ArchivedExchange, RequestMetrics};
use crate::harvest::pacing::pause_for;
use crate::{HarvestError, Result};
use chrono::Utc;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, ORIGIN, REFERER,
};
use reqwest::{Client, Method};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use url::Url;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// One request to the portal
#[derive(Debug, Clone)]
pub struct PortalRequest {
    pub method: Method,
    pub url: Url,
    /// Form fields, sent url-encoded for POST
    pub form: Vec<(String, String)>,
    pub referer: Option<String>,
    /// Extra headers, applied over the session defaults
    pub headers: Vec<(HeaderName, HeaderValue)>,
    /// Overrides the configured client timeout for this call
    pub timeout: Option<Duration>,
}

impl PortalRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            form: Vec::new(),
            referer: None,
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn post<K, V>(url: Url, form: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            method: Method::POST,
            url,
            form: form
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            referer: None,
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn encoded_form(&self) -> Option<String> {
        if self.method != Method::POST {
            return None;
        }
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (name, value) in &self.form {
            serializer.append_pair(name, value);
        }
        Some(serializer.finish())
    }
}

/// What came back from the portal
#[derive(Debug, Clone)]
pub struct PortalResponse {
    pub status: u16,
    /// URL after redirects
    pub final_url: Url,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub elapsed: Duration,
}

impl PortalResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turns a non-2xx response into `HarvestError::HttpStatus`
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(HarvestError::HttpStatus {
                url: self.final_url.to_string(),
                status: self.status,
            })
        }
    }
}

/// Builds the HTTP client used for a portal session
///
/// Cookies are kept in the client's jar so the login session carries over
/// to every later request.
///
/// # Arguments
///
/// * `config` - The client configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &ClientConfig) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .cookie_store(true)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Authenticated session against the portal
///
/// Requests are issued one at a time; the session owns the metrics and the
/// breaker so every call feeds them in order.
pub struct HttpSession {
    client: Client,
    timeout: Duration,
    accept_language: String,
    origin: String,
    breaker: SlowResponseBreaker,
    metrics: RequestMetrics,
    pending_archive: Vec<ArchivedExchange>,
    archive_enabled: bool,
    archive_body_limit: usize,
}

impl HttpSession {
    /// Creates a session, continuing from previously persisted metrics
    pub fn new(
        client_config: &ClientConfig,
        portal: &PortalConfig,
        metrics: RequestMetrics,
    ) -> Result<Self> {
        Ok(Self {
            client: build_http_client(client_config)?,
            timeout: client_config.timeout(),
            accept_language: client_config.accept_language.clone(),
            origin: portal.origin()?,
            breaker: SlowResponseBreaker::new(client_config),
            metrics,
            pending_archive: Vec::new(),
            archive_enabled: client_config.archive_capacity > 0,
            archive_body_limit: client_config.archive_body_limit,
        })
    }

    pub fn metrics(&self) -> &RequestMetrics {
        &self.metrics
    }

    /// Takes the exchanges archived since the last call
    pub fn drain_archive(&mut self) -> Vec<ArchivedExchange> {
        std::mem::take(&mut self.pending_archive)
    }

    /// Sends one request and waits for the whole body
    ///
    /// Non-2xx statuses are returned as responses; only transport failures
    /// become errors (`Timeout` or `Network`). If this response completes a
    /// streak of slow responses, the cooldown is slept before returning.
    pub async fn request(&mut self, request: PortalRequest) -> Result<PortalResponse> {
        let url_text = request.url.to_string();
        let method = request.method.clone();
        let body = request.encoded_form();
        let timeout = request.timeout.unwrap_or(self.timeout);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, ACCEPT_HTML.parse().map_err(invalid_header)?);
        if !self.accept_language.is_empty() {
            headers.insert(
                ACCEPT_LANGUAGE,
                self.accept_language.parse().map_err(invalid_header)?,
            );
        }
        if let Some(referer) = &request.referer {
            headers.insert(REFERER, referer.parse().map_err(invalid_header)?);
        }
        if body.is_some() {
            headers.insert(ORIGIN, self.origin.parse().map_err(invalid_header)?);
            headers.insert(CONTENT_TYPE, FORM_CONTENT_TYPE.parse().map_err(invalid_header)?);
        }
        for (name, value) in &request.headers {
            headers.insert(name.clone(), value.clone());
        }

        let request_headers = header_map(&headers);
        let archived_body = body.as_deref().map(redact_form);

        let mut builder = self
            .client
            .request(method.clone(), request.url.clone())
            .headers(headers)
            .timeout(timeout);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let started_at = Utc::now();
        let start = Instant::now();
        let outcome = match builder.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let final_url = response.url().clone();
                let response_headers = header_map(response.headers());
                response
                    .text()
                    .await
                    .map(|text| (status, final_url, response_headers, text))
            }
            Err(e) => Err(e),
        };
        let elapsed = start.elapsed();

        match outcome {
            Ok((status, final_url, response_headers, text)) => {
                let slow = self.breaker.is_slow(elapsed);
                self.metrics.record(
                    method.as_str(),
                    &url_text,
                    &status.to_string(),
                    elapsed,
                    text.len(),
                    slow,
                );
                tracing::debug!(
                    "{} {} -> {} in {}ms ({} bytes)",
                    method,
                    url_text,
                    status,
                    elapsed.as_millis(),
                    text.len()
                );
                if slow {
                    tracing::warn!("Slow response from {} ({}ms)", url_text, elapsed.as_millis());
                }

                if self.archive_enabled {
                    self.pending_archive.push(ArchivedExchange {
                        started_at,
                        elapsed_ms: elapsed.as_millis() as u64,
                        method: method.to_string(),
                        url: url_text.clone(),
                        request_headers,
                        request_body: archived_body,
                        status: Some(status),
                        response_headers: response_headers.clone(),
                        body_size: text.len(),
                        body_text: Some(truncate_body(&text, self.archive_body_limit)),
                        error: None,
                    });
                }

                self.cool_down_if_throttled(elapsed).await;

                Ok(PortalResponse {
                    status,
                    final_url,
                    headers: response_headers,
                    body: text,
                    elapsed,
                })
            }
            Err(e) => {
                let timed_out = e.is_timeout();
                let label = if timed_out { "timeout" } else { "error" };
                self.metrics
                    .record(method.as_str(), &url_text, label, elapsed, 0, false);
                tracing::debug!("{} {} failed after {}ms: {}", method, url_text, elapsed.as_millis(), e);

                if self.archive_enabled {
                    self.pending_archive.push(ArchivedExchange {
                        started_at,
                        elapsed_ms: elapsed.as_millis() as u64,
                        method: method.to_string(),
                        url: url_text.clone(),
                        request_headers,
                        request_body: archived_body,
                        status: None,
                        response_headers: BTreeMap::new(),
                        body_size: 0,
                        body_text: None,
                        error: Some(e.to_string()),
                    });
                }

                if timed_out {
                    Err(HarvestError::Timeout {
                        url: url_text,
                        timeout_ms: timeout.as_millis() as u64,
                    })
                } else {
                    Err(HarvestError::Network {
                        url: url_text,
                        message: e.to_string(),
                    })
                }
            }
        }
    }

    async fn cool_down_if_throttled(&mut self, elapsed: Duration) {
        if let Some(cooldown) = self.breaker.observe(elapsed) {
            self.metrics.rate_limit_pauses += 1;
            tracing::warn!(
                "Portal looks rate limited; cooling down for {}s",
                cooldown.as_secs()
            );
            pause_for(cooldown).await;
        }
    }
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or("<binary>").to_string(),
            )
        })
        .collect()
}

fn invalid_header(err: reqwest::header::InvalidHeaderValue) -> HarvestError {
    HarvestError::Network {
        url: String::new(),
        message: format!("invalid header value: {}", err),
    }
}
