//! Portal login handshake
//!
//! One attempt walks a fixed sequence of stages:
//!
//! | Stage | Does | Fails when |
//! |-------|------|------------|
//! | FetchLoginPage | GET the login page (sets session cookies) | transport error, non-2xx |
//! | ExtractToken | reads the optional anti-forgery input | never |
//! | SubmitCredentials | POSTs the login form | transport error |
//! | VerifySuccess | looks for the success marker or landing path | neither found |
//!
//! Attempts are retried in a bounded loop, only for timeout and network
//! errors, with exponential backoff.

use crate::extract::find_input_value;
use crate::harvest::context::ScrapeContext;
use crate::harvest::credentials::Credentials;
use crate::harvest::fetcher::{PortalRequest, PortalResponse};
use crate::harvest::pacing::pause_for;
use crate::state::LogLevel;
use crate::{HarvestError, Result};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginStage {
    FetchLoginPage,
    ExtractToken,
    SubmitCredentials,
    VerifySuccess,
}

/// What a successful login looked like
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Attempts made, including the successful one
    pub attempts: u32,
    pub landing_url: Url,
    pub token_sent: bool,
}

#[derive(Debug, Clone)]
pub struct Authenticator {
    max_retries: u32,
}

impl Authenticator {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Logs in, retrying transport failures up to `max_retries` times
    ///
    /// # Returns
    ///
    /// * `Ok(LoginOutcome)` - The session is authenticated
    /// * `Err(HarvestError::Authentication)` - Bad credentials or unexpected pages
    /// * `Err(HarvestError::Timeout | Network)` - Transport kept failing after every retry
    pub async fn login(
        &self,
        ctx: &mut ScrapeContext<'_>,
        credentials: &Credentials,
    ) -> Result<LoginOutcome> {
        let mut attempt: u32 = 0;
        loop {
            if attempt > 0 {
                ctx.log(
                    LogLevel::Warning,
                    format!("Retry attempt {}/{}...", attempt, self.max_retries),
                );
            }

            match self.attempt(ctx, credentials).await {
                Ok((landing_url, token_sent)) => {
                    ctx.log(LogLevel::Success, "Login successful");
                    return Ok(LoginOutcome {
                        attempts: attempt + 1,
                        landing_url,
                        token_sent,
                    });
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let backoff = ctx.pacer.login_backoff(attempt);
                    ctx.log_with(
                        LogLevel::Warning,
                        format!(
                            "Login error: {}; waiting {}s before retry",
                            e,
                            backoff.as_secs()
                        ),
                        [("step", "login")],
                    );
                    pause_for(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    ctx.log_with(
                        LogLevel::Error,
                        format!("Login error: {}", e),
                        [("step", "login")],
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn attempt(
        &self,
        ctx: &mut ScrapeContext<'_>,
        credentials: &Credentials,
    ) -> Result<(Url, bool)> {
        let portal = &ctx.config.portal;
        let login_url = ctx.portal_url(&portal.login_page)?;
        let submit_url = ctx.portal_url(&portal.login_submit)?;
        let token_field = portal.token_field.clone();
        let success_marker = portal.success_marker.clone();
        let post_login_path = portal.post_login_path.clone();

        let mut stage = LoginStage::FetchLoginPage;
        let mut login_html = String::new();
        let mut token: Option<String> = None;
        let mut reply: Option<PortalResponse> = None;

        loop {
            tracing::trace!("Login stage {:?}", stage);
            match stage {
                LoginStage::FetchLoginPage => {
                    ctx.log(LogLevel::Info, "Fetching login page...");
                    let page = ctx.fetch(PortalRequest::get(login_url.clone())).await?;
                    if !page.is_success() {
                        return Err(HarvestError::Authentication(format!(
                            "Failed to load login page: HTTP {}",
                            page.status
                        )));
                    }
                    login_html = page.body;
                    stage = LoginStage::ExtractToken;
                }
                LoginStage::ExtractToken => {
                    token = find_input_value(&login_html, &token_field)
                        .filter(|value| !value.is_empty());
                    if token.is_none() {
                        ctx.log(LogLevel::Debug, "No login token found on the login page");
                    }
                    stage = LoginStage::SubmitCredentials;
                }
                LoginStage::SubmitCredentials => {
                    ctx.log(LogLevel::Info, "Submitting credentials...");
                    let mut form = vec![
                        ("userName".to_string(), credentials.username.clone()),
                        ("password".to_string(), credentials.password().to_string()),
                        ("command".to_string(), "login".to_string()),
                        ("submit".to_string(), "Sign in".to_string()),
                    ];
                    if let Some(value) = &token {
                        form.push((token_field.clone(), value.clone()));
                    }
                    let request = PortalRequest::post(submit_url.clone(), form)
                        .with_referer(login_url.to_string());
                    reply = Some(ctx.fetch(request).await?);
                    stage = LoginStage::VerifySuccess;
                }
                LoginStage::VerifySuccess => {
                    let response = reply.take().ok_or_else(|| {
                        HarvestError::Authentication("No login response to verify".to_string())
                    })?;
                    let marker_found =
                        !success_marker.is_empty() && response.body.contains(&success_marker);
                    let landed = !post_login_path.is_empty()
                        && response.final_url.as_str().contains(&post_login_path);

                    if response.is_success() && (marker_found || landed) {
                        return Ok((response.final_url, token.is_some()));
                    }
                    return Err(HarvestError::Authentication(format!(
                        "Invalid credentials or unexpected response (HTTP {})",
                        response.status
                    )));
                }
            }
        }
    }
}
