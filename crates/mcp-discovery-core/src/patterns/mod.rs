//! Tool name pattern matching
//!
//! Patterns are resolved once, when configuration is loaded, into either a
//! glob matcher or a compiled regular expression:
//!
//! - Glob: `*`, `?`, `[abc]`, `[!abc]`. Case-sensitive and anchored.
//! - Regex: `/body/` or `/body/f` where `f` is a single flag character
//!   (`i`, `m`, `s`, `x`, `u`). Unanchored unless the body anchors itself.
//!
//! ```rust,ignore
//! use mcp_discovery_core::patterns::PatternSet;
//!
//! let set = PatternSet::compile(&["create_*", "/^get_/i"])?;
//! assert!(set.matches("GET_USER"));
//! ```

mod matcher;

pub use matcher::{
    match_rule, match_tool, server_filter_matches, Pattern, PatternError, PatternRule, PatternSet,
};
