//! Rendering of the checklist issue body.
//!
//! The body is regenerated from scratch on every bootstrap run, so rendering is
//! a pure function of the report. Section order is fixed.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::core::types::{BuildStatus, NotifyOutcome, PathReport, ReconcileStatus, RepositoryContext};

/// Everything the checklist body shows.
#[derive(Debug, Clone)]
pub struct ChecklistReport {
    pub repo: RepositoryContext,
    /// `None` when the remote had no runs or the probe failed.
    pub build: Option<BuildStatus>,
    pub paths: Vec<PathReport>,
    pub notifier: NotifyOutcome,
    /// Active configuration, already serialized for display.
    pub config_snapshot: String,
    pub timezone: String,
    pub generated_at: DateTime<Utc>,
}

impl ChecklistReport {
    /// True when every path is present or has a PR in flight.
    pub fn all_paths_ok(&self) -> bool {
        self.paths
            .iter()
            .all(|report| matches!(report, PathReport::Reconciled(_)))
    }
}

/// Render the full Markdown body.
pub fn render(report: &ChecklistReport) -> String {
    let mut lines = vec![
        "## Agent checklist".to_string(),
        String::new(),
        format!("- Repository: `{}`", report.repo.slug()),
        format!("- Branch: `{}`", report.repo.default_branch),
        format!(
            "- Generated: {} (display timezone: {})",
            report.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            report.timezone
        ),
        String::new(),
    ];

    lines.extend(["### Build".to_string(), String::new()]);
    lines.push(match &report.build {
        Some(build) => match &build.url {
            Some(url) => format!("- {build} ([run]({url}))"),
            None => format!("- {build}"),
        },
        None => "- No build status available".to_string(),
    });
    lines.push(String::new());

    lines.extend(["### Site files".to_string(), String::new()]);
    if report.paths.is_empty() {
        lines.push("- No files configured (`site.ensure_files` is empty)".to_string());
    }
    lines.extend(report.paths.iter().map(render_path_line));
    lines.push(String::new());

    lines.extend(["### Webhook".to_string(), String::new()]);
    let mark = if report.notifier.is_reachable() { "x" } else { " " };
    lines.push(format!("- [{mark}] Make webhook: {}", report.notifier.summary()));
    lines.push(String::new());

    lines.extend([
        "### Configuration".to_string(),
        String::new(),
        "```toml".to_string(),
        report.config_snapshot.trim_end().to_string(),
        "```".to_string(),
    ]);

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// One checklist line for a path; also used by `/ensure site` replies.
pub fn render_path_line(report: &PathReport) -> String {
    match report {
        PathReport::Reconciled(outcome) => {
            let mark = if outcome.status == ReconcileStatus::PrOpened { " " } else { "x" };
            let mut line = format!("- [{mark}] `{}`: {}", outcome.path, outcome.status);
            if let Some(url) = &outcome.pr_url {
                line.push_str(&format!(" ({url})"));
            }
            if let Some(err) = &outcome.merge_error {
                line.push_str(&format!(" (merge skipped: {err})"));
            }
            line
        }
        PathReport::Failed { path, error } => format!("- [ ] `{path}`: failed ({error})"),
    }
}
