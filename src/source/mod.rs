//! Source resolution and caching

pub mod cache;
pub mod resolver;

pub use cache::{ArtifactCache, CachedArtifact};
pub use resolver::{check_content, resolve_base64, resolve_cache, resolve_path};
