//! # Topic Filters
//!
//! Subscriber-side matching over dot-separated topics. The bus fans every
//! frame out to every receiver; filters decide what a subscription keeps.
//!
//! ## Pattern Syntax
//!
//! - `*` matches exactly one token: `cluster.*` matches `cluster.presence`
//!   but not `cluster` or `cluster.a.b`.
//! - `>` in tail position matches one or more remaining tokens:
//!   `record.data.>` matches `record.data.weather.berlin`.
//! - `>` anywhere else is a literal token, not a wildcard.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum Segment {
    Literal(String),
    /// `*` - exactly one token.
    AnyOne,
    /// `>` - one or more trailing tokens.
    AnyTail,
}

/// A compiled topic pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl TopicPattern {
    /// Compile a pattern. Parsing never fails: unrecognized tokens are
    /// literals, and a non-tail `>` simply matches the literal token `>`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let token_count = raw.split('.').count();
        let segments = raw
            .split('.')
            .enumerate()
            .map(|(index, token)| match token {
                "*" => Segment::AnyOne,
                ">" if index + 1 == token_count => Segment::AnyTail,
                other => Segment::Literal(other.to_owned()),
            })
            .collect();
        Self {
            raw: raw.to_owned(),
            segments,
        }
    }

    /// The pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether a concrete topic matches this pattern.
    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        let mut tokens = topic.split('.');
        for segment in &self.segments {
            match segment {
                Segment::Literal(expected) => match tokens.next() {
                    Some(token) if token == expected => {}
                    _ => return false,
                },
                Segment::AnyOne => {
                    if tokens.next().is_none() {
                        return false;
                    }
                }
                // Tail requires at least one remaining token.
                Segment::AnyTail => return tokens.next().is_some(),
            }
        }
        tokens.next().is_none()
    }
}

impl std::fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Filter for subscribing to specific topics.
#[derive(Debug, Clone, Default)]
pub struct BusFilter {
    /// Patterns to include. Empty means all topics.
    pub patterns: Vec<TopicPattern>,
}

impl BusFilter {
    /// Create a filter that accepts every frame.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for a single exact topic.
    #[must_use]
    pub fn topic(topic: &str) -> Self {
        Self::pattern(topic)
    }

    /// Create a filter for a single pattern.
    #[must_use]
    pub fn pattern(pattern: &str) -> Self {
        Self {
            patterns: vec![TopicPattern::parse(pattern)],
        }
    }

    /// Create a filter matching any of several patterns.
    #[must_use]
    pub fn patterns(patterns: &[&str]) -> Self {
        Self {
            patterns: patterns
                .iter()
                .map(|pattern| TopicPattern::parse(pattern))
                .collect(),
        }
    }

    /// Whether a frame on `topic` passes this filter.
    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|pattern| pattern.matches(topic))
    }

    /// Stable key describing this filter, used for subscription accounting.
    #[must_use]
    pub fn key(&self) -> String {
        if self.patterns.is_empty() {
            return ">".to_owned();
        }
        self.patterns
            .iter()
            .map(TopicPattern::as_str)
            .collect::<Vec<_>>()
            .join("|")
    }
}
