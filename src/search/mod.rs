//! Search layer facade.
//!
//! - **[`canonicalize`]**: folding, query normalization and tokenization.
//! - **[`query`]**: the linear scan-and-score search over a loaded index.

pub mod canonicalize;
pub mod query;

pub use query::{
    HitKind, MatchMode, SearchClient, SearchHit, SearchOptions, SearchResults, SearchScope,
};
