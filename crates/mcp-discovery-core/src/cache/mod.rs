//! Catalog caching
//!
//! ```rust,ignore
//! let cache: CachingLayer<Arc<Vec<ToolMetadata>>, ServerError> = CachingLayer::new(true);
//! let tools = cache
//!     .get_or_compute("tools:github", Duration::from_secs(3600), || fetch_catalog("github"))
//!     .await?;
//! ```

mod layer;

pub use layer::{CacheStats, CachingLayer};
