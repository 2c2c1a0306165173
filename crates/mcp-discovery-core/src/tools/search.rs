//! Relevance-ranked search over tool catalogs

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{SearchOptions, SearchResult, ToolMetadata};

static TOKEN_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").unwrap());

const EXACT_NAME: f64 = 10.0;
const NAME_SUBSTRING: f64 = 5.0;
const NAME_TOKEN: f64 = 2.0;
const NAME_TOKEN_PARTIAL: f64 = 1.0;
const SERVER_TOKEN: f64 = 1.0;
const TAG_TOKEN: f64 = 0.75;
const DESCRIPTION_TOKEN: f64 = 0.5;

/// Lower-case `text` and split it on anything that is not a letter or digit
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN_SPLIT
        .split(&text.to_lowercase())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Scores tools against free-text queries
///
/// An exact name match outranks a name substring, which outranks token
/// matches in the description or tags. Ties are ordered by server then
/// tool name.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchEngine;

impl SearchEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn search<'a, I>(&self, query: &str, tools: I, options: &SearchOptions) -> Vec<SearchResult>
    where
        I: IntoIterator<Item = &'a ToolMetadata>,
    {
        let query = query.trim().to_lowercase();
        let tokens = tokenize(&query);
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut results: Vec<SearchResult> = tools
            .into_iter()
            .filter(|t| options.include_disabled || t.enabled)
            .filter(|t| options.server.as_deref().map_or(true, |s| s == t.server))
            .filter_map(|tool| {
                let relevance = self.score(&query, &tokens, tool);
                (relevance > 0.0).then(|| SearchResult {
                    server: tool.server.clone(),
                    tool: tool.name.clone(),
                    summary: tool.summary.clone(),
                    relevance,
                    tags: tool.tags.clone(),
                    input_schema: options.include_schema.then(|| tool.input_schema.clone()),
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.server.cmp(&b.server))
                .then_with(|| a.tool.cmp(&b.tool))
        });
        results.truncate(options.effective_limit());
        results
    }

    /// Relevance of `tool` for a lower-cased query and its tokens
    pub fn score(&self, query: &str, tokens: &[String], tool: &ToolMetadata) -> f64 {
        let name = tool.name.to_lowercase();
        let name_tokens = tokenize(&tool.name);
        let server_tokens = tokenize(&tool.server);
        let tags: Vec<String> = tool.tags.iter().map(|t| t.to_lowercase()).collect();

        let mut text = tool.summary.clone();
        if let Some(description) = &tool.description {
            text.push(' ');
            text.push_str(description);
        }
        let text_tokens = tokenize(&text);

        let mut score = 0.0;
        if name == query {
            score += EXACT_NAME;
        } else if name.contains(query) {
            score += NAME_SUBSTRING;
        }

        for token in tokens {
            if name_tokens.contains(token) {
                score += NAME_TOKEN;
            } else if name.contains(token.as_str()) {
                score += NAME_TOKEN_PARTIAL;
            }
            if text_tokens.contains(token) {
                score += DESCRIPTION_TOKEN;
            }
            if tags.iter().any(|t| t == token || tokenize(t).contains(token)) {
                score += TAG_TOKEN;
            }
            if server_tokens.contains(token) {
                score += SERVER_TOKEN;
            }
        }

        score
    }
}
