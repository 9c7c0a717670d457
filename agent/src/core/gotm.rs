//! Goal-of-the-month vote window state.
//!
//! The state lives in a JSON document in the repository; these transitions only
//! compute the next document.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GotmState {
    pub status: VoteStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub channels: Vec<String>,
}

impl GotmState {
    /// Open and not yet past its closing time.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == VoteStatus::Open && now < self.closes_at
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GotmError {
    #[error("a vote is already open until {0}")]
    AlreadyOpen(DateTime<Utc>),
    #[error("no vote is open")]
    NotOpen,
    #[error("a {0}-day vote window ends outside the supported date range")]
    WindowOutOfRange(u32),
}

/// Start a vote window of `window_days` from `now`.
///
/// An expired open window does not block a new one.
pub fn open_vote(
    current: Option<&GotmState>,
    now: DateTime<Utc>,
    window_days: u32,
    channels: &[String],
    label: Option<&str>,
) -> Result<GotmState, GotmError> {
    if let Some(state) = current.filter(|s| s.is_active(now)) {
        return Err(GotmError::AlreadyOpen(state.closes_at));
    }
    let closes_at = Duration::try_days(i64::from(window_days))
        .and_then(|window| now.checked_add_signed(window))
        .ok_or(GotmError::WindowOutOfRange(window_days))?;
    Ok(GotmState {
        status: VoteStatus::Open,
        label: label.map(str::trim).filter(|l| !l.is_empty()).map(str::to_string),
        opened_at: now,
        closes_at,
        closed_at: None,
        channels: channels.to_vec(),
    })
}

/// Close the current vote, even if its window already lapsed.
pub fn close_vote(current: Option<&GotmState>, now: DateTime<Utc>) -> Result<GotmState, GotmError> {
    match current {
        Some(state) if state.status == VoteStatus::Open => Ok(GotmState {
            status: VoteStatus::Closed,
            closed_at: Some(now),
            ..state.clone()
        }),
        _ => Err(GotmError::NotOpen),
    }
}
