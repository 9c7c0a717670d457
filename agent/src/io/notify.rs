//! Outbound webhook notifier (Make scenario endpoint).

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::blocking::Client;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::core::types::NotifyOutcome;
use crate::io::remote::Notifier;

/// Name of the secret holding the webhook URL.
pub const WEBHOOK_SECRET: &str = "MAKE_WEBHOOK_URL";

/// JSON body of every webhook POST.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    pub repo: String,
    pub timestamp: String,
}

impl Envelope {
    pub fn new(event_type: &str, source: &str, repo: &str, now: DateTime<Utc>) -> Self {
        Self {
            event_type: event_type.to_string(),
            source: source.to_string(),
            repo: repo.to_string(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Posts envelopes to a configured URL with a bounded timeout.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: Client,
    url: Option<String>,
    source: String,
    repo: String,
}

impl WebhookNotifier {
    pub fn new(url: Option<String>, source: &str, repo: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("build webhook http client")?;
        Ok(Self {
            http,
            url: url.filter(|u| !u.trim().is_empty()),
            source: source.to_string(),
            repo: repo.to_string(),
        })
    }
}

impl Notifier for WebhookNotifier {
    fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    #[instrument(skip_all, fields(event_type = %event_type))]
    fn notify(&self, event_type: &str) -> NotifyOutcome {
        let Some(url) = &self.url else {
            info!("webhook not configured, skipping");
            return NotifyOutcome::Unconfigured;
        };
        let envelope = Envelope::new(event_type, &self.source, &self.repo, Utc::now());
        match self.http.post(url).json(&envelope).send() {
            Ok(response) if response.status().is_success() => {
                info!(status = response.status().as_u16(), "webhook delivered");
                NotifyOutcome::Delivered {
                    status: response.status().as_u16(),
                }
            }
            Ok(response) => {
                warn!(status = response.status().as_u16(), "webhook rejected");
                NotifyOutcome::Failed {
                    summary: format!("HTTP {}", response.status().as_u16()),
                }
            }
            Err(err) => {
                let summary = if err.is_timeout() {
                    "timed out".to_string()
                } else {
                    err.to_string()
                };
                warn!(error = %summary, "webhook unreachable");
                NotifyOutcome::Failed { summary }
            }
        }
    }
}
