//! lvat Retrieval
//!
//! Read path for stored history:
//!
//! - **retriever**: priority-ordered lookup of the compacted blob and the
//!   recent buffer for a value
//!
//! # Example
//!
//! ```rust,ignore
//! use lvat::query::Retriever;
//!
//! let retriever = Retriever::new(indices, store);
//! if let Some(gzip) = retriever.lookup("req1").await? {
//!     // serve as-is with `Content-Encoding: gzip`
//! }
//! ```

mod retriever;

pub use retriever::{CompactedHit, Retriever};
