use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Main configuration structure for Campus-Harvest
///
/// Every section is optional; a missing section falls back to the defaults
/// tuned for the legacy portal (slow responses, aggressive throttling).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// Default selection (`grades = true`) used when no datasets are named
    #[serde(default)]
    pub datasets: BTreeMap<String, bool>,
}

/// Portal location and login handshake configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Base URL every page path is resolved against
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Page that hands out the session cookie and anti-forgery token
    #[serde(rename = "login-page")]
    pub login_page: String,

    /// Form action the credentials are posted to
    #[serde(rename = "login-submit")]
    pub login_submit: String,

    /// Name of the hidden input carrying the one-time token
    #[serde(rename = "token-field")]
    pub token_field: String,

    /// Marker in the login response body that proves a login (case-sensitive)
    #[serde(rename = "success-marker")]
    pub success_marker: String,

    /// Path fragment of the landing page reached after a successful login
    #[serde(rename = "post-login-path")]
    pub post_login_path: String,

    /// Page sent as Referer for top-level dataset requests
    #[serde(rename = "referer-page")]
    pub referer_page: String,

    /// Per-dataset page overrides, keyed by dataset key
    pub paths: BTreeMap<String, String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: "https://aisis.ateneo.edu/j_aisis/".to_string(),
            login_page: "displayLogin.do".to_string(),
            login_submit: "login.do".to_string(),
            token_field: "rnd".to_string(),
            success_marker: "welcome".to_string(),
            post_login_path: "welcome.do".to_string(),
            referer_page: "welcome.do".to_string(),
            paths: BTreeMap::new(),
        }
    }
}

impl PortalConfig {
    /// Resolves a page path against the base URL
    ///
    /// The base is treated as a directory even when it lacks a trailing slash,
    /// so `https://host/app` + `login.do` yields `https://host/app/login.do`.
    pub fn resolve(&self, path: &str) -> Result<Url, url::ParseError> {
        let mut base = self.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Url::parse(&base)?.join(path)
    }

    /// Origin header value for form posts (scheme + host + port)
    pub fn origin(&self) -> Result<String, url::ParseError> {
        let base = Url::parse(&self.base_url)?;
        Ok(base.origin().ascii_serialization())
    }
}

/// HTTP client behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClientConfig {
    pub user_agent: String,
    pub accept_language: String,

    /// Per-request timeout (milliseconds)
    pub timeout_ms: u64,

    /// Responses slower than this count towards the slow streak
    pub slow_response_ms: u64,

    /// Responses faster than this reset the slow streak
    pub fast_response_ms: u64,

    /// Consecutive slow responses that trigger a cooldown
    pub slow_streak: u32,

    pub cooldown_min_ms: u64,
    pub cooldown_max_ms: u64,

    /// Maximum number of archived request/response exchanges
    pub archive_capacity: usize,

    /// Archived bodies are cut past this many characters
    pub archive_body_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            timeout_ms: 90_000,
            slow_response_ms: 5_000,
            fast_response_ms: 2_000,
            slow_streak: 3,
            cooldown_min_ms: 45_000,
            cooldown_max_ms: 60_000,
            archive_capacity: 200,
            archive_body_limit: 200_000,
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Delays between requests and login retry policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PacingConfig {
    /// Lower bound of the randomized delay between catalog sub-items
    pub item_delay_min_ms: u64,

    /// Upper bound of the randomized delay between catalog sub-items
    pub item_delay_max_ms: u64,

    /// Fixed delay after each single-page dataset
    pub page_delay_ms: u64,

    /// Retries after the first login attempt (network errors only)
    pub login_retries: u32,

    /// First login backoff; doubled on every further retry
    pub login_backoff_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            item_delay_min_ms: 2_000,
            item_delay_max_ms: 4_000,
            page_delay_ms: 1_000,
            login_retries: 3,
            login_backoff_ms: 2_000,
        }
    }
}

/// Table extraction heuristics
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExtractionConfig {
    /// Tables matching a navigation pattern are dropped unless they carry
    /// more data rows than this
    pub nav_row_threshold: usize,

    /// Regular expressions recognising portal chrome (menus, footers)
    pub nav_patterns: Vec<String>,

    /// Raw HTML kept per single-page dataset is cut past this many characters
    pub snapshot_limit: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            nav_row_threshold: 3,
            nav_patterns: vec![
                r"(?i)\bsign\s*out\b".to_string(),
                r"(?i)\blog\s*out\b".to_string(),
                r"(?i)\bmain\s+menu\b".to_string(),
                r"(?i)\bchange\s+password\b".to_string(),
                r"(?i)\bmy\s+account\b".to_string(),
                r"(?i)\bcopyright\b".to_string(),
                r"(?i)\bhome\b.*\bhelp\b".to_string(),
            ],
            snapshot_limit: 250_000,
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Number of log entries kept in the persisted state
    pub log_history: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "./campus-harvest.db".to_string(),
            log_history: 500,
        }
    }
}

/// Where the portal credentials are read from
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CredentialsConfig {
    pub username_env: String,
    pub password_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            username_env: "PORTAL_USERNAME".to_string(),
            password_env: "PORTAL_PASSWORD".to_string(),
        }
    }
}
