//! Glob and regex pattern compilation and matching

use std::fmt;

use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// Errors raised while compiling a pattern
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("invalid glob pattern '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    #[error("invalid regex pattern '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("unsupported regex flag '{flag}' in '{pattern}'")]
    UnsupportedFlag { pattern: String, flag: char },
}

/// A single compiled tool name pattern
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Anchored, case-sensitive glob
    Glob { source: String, glob: glob::Pattern },
    /// `/body/flags` regular expression
    Regex { source: String, regex: Regex },
}

impl Pattern {
    /// Compile a pattern string.
    ///
    /// Strings of the form `/body/` or `/body/f` become regular expressions,
    /// everything else is treated as a glob.
    pub fn compile(raw: &str) -> Result<Self, PatternError> {
        match split_regex_literal(raw) {
            Some((body, flag)) => compile_regex(raw, body, flag),
            None => glob::Pattern::new(raw)
                .map(|glob| Pattern::Glob {
                    source: raw.to_string(),
                    glob,
                })
                .map_err(|e| PatternError::InvalidGlob {
                    pattern: raw.to_string(),
                    message: e.msg.to_string(),
                }),
        }
    }

    /// Test a name against this pattern
    pub fn is_match(&self, name: &str) -> bool {
        match self {
            Pattern::Glob { glob, .. } => glob.matches(name),
            Pattern::Regex { regex, .. } => regex.is_match(name),
        }
    }

    /// The pattern as written in configuration
    pub fn source(&self) -> &str {
        match self {
            Pattern::Glob { source, .. } | Pattern::Regex { source, .. } => source,
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, Pattern::Regex { .. })
    }

    /// Returns true when `raw` uses the `/body/flags` regex encoding
    pub fn is_regex_literal(raw: &str) -> bool {
        split_regex_literal(raw).is_some()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source())
    }
}

/// Split `/body/f` into `(body, Some(f))`. Returns `None` for anything that
/// is not a regex literal, including a trailing suffix longer than one char.
fn split_regex_literal(raw: &str) -> Option<(&str, Option<char>)> {
    if !raw.starts_with('/') {
        return None;
    }
    let last = raw.rfind('/')?;
    if last == 0 {
        return None;
    }

    let suffix = &raw[last + 1..];
    let mut chars = suffix.chars();
    let flag = chars.next();
    if chars.next().is_some() {
        return None;
    }

    Some((&raw[1..last], flag))
}

fn compile_regex(raw: &str, body: &str, flag: Option<char>) -> Result<Pattern, PatternError> {
    let mut builder = RegexBuilder::new(body);
    match flag {
        None | Some('u') => {}
        Some('i') => {
            builder.case_insensitive(true);
        }
        Some('m') => {
            builder.multi_line(true);
        }
        Some('s') => {
            builder.dot_matches_new_line(true);
        }
        Some('x') => {
            builder.ignore_whitespace(true);
        }
        Some(other) => {
            return Err(PatternError::UnsupportedFlag {
                pattern: raw.to_string(),
                flag: other,
            })
        }
    }

    builder
        .build()
        .map(|regex| Pattern::Regex {
            source: raw.to_string(),
            regex,
        })
        .map_err(|e| PatternError::InvalidRegex {
            pattern: raw.to_string(),
            message: e.to_string(),
        })
}

/// An OR-combined list of patterns
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Compile every pattern, collecting all failures rather than stopping
    /// at the first one.
    pub fn compile<S: AsRef<str>>(raw: &[S]) -> Result<Self, Vec<PatternError>> {
        let mut patterns = Vec::with_capacity(raw.len());
        let mut errors = Vec::new();

        for source in raw {
            match Pattern::compile(source.as_ref()) {
                Ok(pattern) => patterns.push(pattern),
                Err(e) => errors.push(e),
            }
        }

        if errors.is_empty() {
            Ok(Self { patterns })
        } else {
            Err(errors)
        }
    }

    pub fn from_patterns(patterns: Vec<Pattern>) -> Self {
        Self { patterns }
    }

    /// True iff `name` matches any pattern. An empty set matches nothing.
    pub fn matches(&self, name: &str) -> bool {
        match_tool(name, &self.patterns)
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }
}

/// True iff `name` matches any of `patterns`
pub fn match_tool(name: &str, patterns: &[Pattern]) -> bool {
    patterns.iter().any(|p| p.is_match(name))
}

/// A pattern list optionally scoped to a single server
#[derive(Debug, Clone)]
pub struct PatternRule {
    /// Exact server name this rule is restricted to
    pub server: Option<String>,
    /// Tool name patterns
    pub patterns: PatternSet,
}

impl PatternRule {
    pub fn new(patterns: PatternSet) -> Self {
        Self {
            server: None,
            patterns,
        }
    }

    pub fn for_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }
}

/// Server filters are exact matches; an absent filter applies everywhere
pub fn server_filter_matches(filter: Option<&str>, server_name: &str) -> bool {
    filter.map_or(true, |f| f == server_name)
}

/// Check a tool against a pattern rule, honouring its server filter
pub fn match_rule(tool_name: &str, server_name: &str, rule: &PatternRule) -> bool {
    server_filter_matches(rule.server.as_deref(), server_name) && rule.patterns.matches(tool_name)
}
