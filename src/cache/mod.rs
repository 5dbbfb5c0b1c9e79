//! Request caching for outbound HTTP GETs.
//!
//! This module provides a GitHub-agnostic response cache that:
//! - Keeps raw response bodies keyed by a hashed request identity
//! - Treats entries past their TTL as absent and evicts them lazily
//! - Optionally persists the whole map to disk with debounced writes
//! - Drains pending writes on explicit flush and on drop

mod layer;
mod storage;
mod traits;

pub use layer::RequestCache;
pub use traits::QueryKey;
