//! Starter content for files the reconciler creates.
//!
//! Starter content is the smallest document the site can render. Which shape a
//! path gets is decided by its file name, so new desired files only need a
//! config entry and, at most, a new rule.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};

/// Produces the starter document for a path.
pub trait StarterGenerator {
    fn generate(&self, path: &str) -> Value;
}

impl<F> StarterGenerator for F
where
    F: Fn(&str) -> Value,
{
    fn generate(&self, path: &str) -> Value {
        self(path)
    }
}

/// Known starter document shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StarterShape {
    /// `{"updated", "headers": [], "rows": []}`
    Table,
    /// `{"updated", "status": "offline", "message": ""}`
    Text,
    /// `{"updated"}`
    Timestamp,
}

impl StarterShape {
    pub fn render(self, now: DateTime<Utc>) -> Value {
        let updated = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        match self {
            StarterShape::Table => json!({"updated": updated, "headers": [], "rows": []}),
            StarterShape::Text => json!({"updated": updated, "status": "offline", "message": ""}),
            StarterShape::Timestamp => json!({"updated": updated}),
        }
    }
}

/// Generator keyed on the final path component; unmatched paths get
/// [`StarterShape::Timestamp`].
#[derive(Debug, Clone)]
pub struct SuffixStarter {
    rules: Vec<(String, StarterShape)>,
    now: DateTime<Utc>,
}

impl SuffixStarter {
    pub fn new(rules: Vec<(String, StarterShape)>, now: DateTime<Utc>) -> Self {
        Self { rules, now }
    }

    /// `table.json` → table shape, `live.json` → text shape.
    pub fn with_default_rules(now: DateTime<Utc>) -> Self {
        Self::new(
            vec![
                ("table.json".to_string(), StarterShape::Table),
                ("live.json".to_string(), StarterShape::Text),
            ],
            now,
        )
    }

    pub fn shape_for(&self, path: &str) -> StarterShape {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        self.rules
            .iter()
            .find(|(name, _)| name == file_name)
            .map(|(_, shape)| *shape)
            .unwrap_or(StarterShape::Timestamp)
    }
}

impl StarterGenerator for SuffixStarter {
    fn generate(&self, path: &str) -> Value {
        self.shape_for(path).render(self.now)
    }
}

/// Serialize a document the way the agent commits it: pretty JSON plus newline.
pub fn to_file_contents(value: &Value) -> serde_json::Result<String> {
    let mut buf = serde_json::to_string_pretty(value)?;
    buf.push('\n');
    Ok(buf)
}
