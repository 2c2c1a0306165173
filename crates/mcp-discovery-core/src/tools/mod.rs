//! Tool catalogs and search
//!
//! ```text
//!  upstream tools/list ──► ToolMetadataManager ──► per-server catalog
//!                              │  server rules         (Arc swap)
//!                              │  tool rules
//!                              ▼
//!                          SearchEngine ──► ranked SearchResult list
//! ```

mod metadata;
mod search;

pub use metadata::ToolMetadataManager;
pub(crate) use metadata::{filter_enabled, find_tool};
pub use search::{tokenize, SearchEngine};
