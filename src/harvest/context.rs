//! Everything a dataset scraper needs for one run
//!
//! The context borrows the orchestrator's pieces for the duration of a run
//! so scrapers never reach for ambient globals.

use crate::config::Config;
use crate::extract::NavFilter;
use crate::harvest::control::ControlHandle;
use crate::harvest::fetcher::{HttpSession, PortalRequest, PortalResponse};
use crate::harvest::hub::StateHub;
use crate::harvest::pacing::Pacer;
use crate::state::LogLevel;
use crate::Result;
use std::collections::BTreeMap;
use url::Url;

pub struct ScrapeContext<'a> {
    pub config: &'a Config,
    pub session: &'a mut HttpSession,
    pub hub: &'a mut StateHub,
    pub control: &'a ControlHandle,
    pub pacer: &'a Pacer,
    pub nav_filter: &'a NavFilter,
}

impl ScrapeContext<'_> {
    /// Sends a request and mirrors the session metrics into the state
    pub async fn fetch(&mut self, request: PortalRequest) -> Result<PortalResponse> {
        let result = self.session.request(request).await;
        let archived = self.session.drain_archive();
        self.hub.record_session(self.session.metrics(), archived);
        result
    }

    /// Absolute URL of a portal page
    pub fn portal_url(&self, path: &str) -> Result<Url> {
        Ok(self.config.portal.resolve(path)?)
    }

    /// Referer sent with dataset GETs (the post-login landing page)
    pub fn landing_referer(&self) -> Result<String> {
        Ok(self.portal_url(&self.config.portal.referer_page)?.to_string())
    }

    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.hub.log(level, message);
    }

    pub fn log_with<I, K, V>(&mut self, level: LogLevel, message: impl Into<String>, context: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let context: BTreeMap<String, String> = context
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.hub.log_with(level, message, context);
    }
}
