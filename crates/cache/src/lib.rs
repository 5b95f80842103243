//! Enrichment-fetch cache (spec §4.3): summarizes slow enrichment calls
//! (memory recall, calendar lookups, list reads) and caches the summary by
//! fingerprint, so repeated requests for the same context skip the fetch.

pub mod error;
pub mod source_kind;
pub mod store;

pub use error::CacheError;
pub use source_kind::SourceKind;
pub use store::ContextCache;
