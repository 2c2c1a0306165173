//! Rules as authored in configuration

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A rule in either of the two accepted shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawRule {
    /// `{ when, set?, push? }`
    Conditional(ConditionalRule),
    /// `{ pattern, server?, enabled?, tags? }`
    Pattern(PatternRuleConfig),
    /// Anything else. Kept so compilation can report it alongside every
    /// other problem instead of failing the whole document.
    Invalid(Value),
}

/// Condition → mutation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionalRule {
    /// Condition tree (validated on compile)
    pub when: Value,
    /// Fields overwritten when matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<Map<String, Value>>,
    /// Tag-list fields appended to when matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push: Option<Map<String, Value>>,
}

/// Pattern-list rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternRuleConfig {
    /// Glob or `/regex/flags` patterns for the name
    pub pattern: OneOrMany,
    /// Exact server name to restrict to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// A single string or a list of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s.clone()],
            OneOrMany::Many(v) => v.clone(),
        }
    }
}

impl RawRule {
    /// Build a conditional rule from a JSON `when` value
    pub fn when(when: Value) -> Self {
        RawRule::Conditional(ConditionalRule {
            when,
            set: None,
            push: None,
        })
    }

    /// Add a `set` entry (conditional rules only)
    pub fn set(mut self, field: &str, value: Value) -> Self {
        if let RawRule::Conditional(rule) = &mut self {
            rule.set.get_or_insert_with(Map::new).insert(field.to_string(), value);
        }
        self
    }

    /// Add a `push` entry (conditional rules only)
    pub fn push(mut self, field: &str, value: Value) -> Self {
        if let RawRule::Conditional(rule) = &mut self {
            rule.push.get_or_insert_with(Map::new).insert(field.to_string(), value);
        }
        self
    }

    /// Build a pattern rule
    pub fn pattern(patterns: &[&str]) -> PatternRuleConfig {
        PatternRuleConfig {
            pattern: OneOrMany::Many(patterns.iter().map(|p| p.to_string()).collect()),
            server: None,
            enabled: None,
            tags: Vec::new(),
        }
    }
}

impl PatternRuleConfig {
    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

impl From<PatternRuleConfig> for RawRule {
    fn from(rule: PatternRuleConfig) -> Self {
        RawRule::Pattern(rule)
    }
}
