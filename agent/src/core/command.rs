//! Verb matching for issue commands.
//!
//! Matching runs against the lower-cased first line of the command text. The
//! rule table is ordered: exact rules come first, then prefix rules, and the
//! first hit wins. Text after a prefix is returned from the *original* input so
//! payload string values keep their case.

use std::fmt;

/// Recognized command verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Help,
    Status,
    EnsureSite,
    WireMake,
    GotmOpen,
    GotmClose,
    UpdateLive,
    UpdateTable,
}

impl Verb {
    /// Canonical spelling used in replies and `/help`.
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Help => "/help",
            Verb::Status => "/status",
            Verb::EnsureSite => "/ensure site",
            Verb::WireMake => "/wire make",
            Verb::GotmOpen => "/gotm open",
            Verb::GotmClose => "/gotm close",
            Verb::UpdateLive => "/update live",
            Verb::UpdateTable => "/update table",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a rule compares against the normalized first line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    Exact(&'static str),
    Prefix(&'static str),
}

impl Matcher {
    /// Byte length of the matched prefix, or `None` when the rule misses.
    fn matches(self, line: &str) -> Option<usize> {
        match self {
            Matcher::Exact(word) => (line == word).then_some(word.len()),
            Matcher::Prefix(prefix) => line.starts_with(prefix).then_some(prefix.len()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub matcher: Matcher,
    pub verb: Verb,
}

const fn exact(word: &'static str, verb: Verb) -> Rule {
    Rule {
        matcher: Matcher::Exact(word),
        verb,
    }
}

const fn prefix(word: &'static str, verb: Verb) -> Rule {
    Rule {
        matcher: Matcher::Prefix(word),
        verb,
    }
}

/// Default rule table, in evaluation order.
pub const RULES: &[Rule] = &[
    exact("/help", Verb::Help),
    exact("/status", Verb::Status),
    exact("/ensure site", Verb::EnsureSite),
    exact("/wire make", Verb::WireMake),
    exact("/test make", Verb::WireMake),
    prefix("/gotm open", Verb::GotmOpen),
    prefix("/gotm close", Verb::GotmClose),
    prefix("/update live", Verb::UpdateLive),
    prefix("/update table", Verb::UpdateTable),
];

/// A matched command: the verb plus the untouched text after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub verb: Verb,
    pub rest: String,
}

/// Match `text` against `rules`; `None` means no rule applies.
pub fn parse_with(rules: &[Rule], text: &str) -> Option<ParsedCommand> {
    let trimmed = text.trim();
    let first_line = trimmed.lines().next().unwrap_or("").trim_end();
    let normalized = first_line.to_lowercase();

    rules.iter().find_map(|rule| {
        let matched = rule.matcher.matches(&normalized)?;
        // ASCII-only rule words keep byte offsets aligned between the lowered
        // line and the original text.
        let rest = trimmed.get(matched..).unwrap_or("").trim().to_string();
        Some(ParsedCommand {
            verb: rule.verb,
            rest,
        })
    })
}

/// Match `text` against the default [`RULES`].
pub fn parse(text: &str) -> Option<ParsedCommand> {
    parse_with(RULES, text)
}
