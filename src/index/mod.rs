//! lvat Indexing
//!
//! Decides where each ingested line is stored:
//!
//! - **conf**: index definitions ([`IndexConf`]) and their ordered set
//! - **keys**: store key layout for each (index, value)
//! - **message**: the parsed line ([`LogMessage`])
//! - **grouping**: per-batch partitioning into (index, value) groups
//!
//! # Example
//!
//! ```rust
//! use lvat::index::{build_groups, IndexConf, IndexSet, LogMessage};
//! use std::collections::HashMap;
//! use std::time::Duration;
//!
//! let indices = IndexSet::new(vec![
//!     IndexConf::new("request_id", 500, Duration::from_secs(48 * 3600)).split_values(true),
//! ])
//! .unwrap();
//!
//! let pairs = HashMap::from([("request_id".to_string(), "a,b".to_string())]);
//! let batch = vec![LogMessage::new("request_id=a,b", pairs)];
//!
//! let groups = build_groups(&indices, &batch);
//! assert_eq!(groups.len(), 2);
//! ```

mod conf;
mod grouping;
pub mod keys;
mod message;

pub use conf::{IndexConf, IndexSet, StorageStrategy};
pub use grouping::{build_groups, Group, StorageGroup, VALUE_SEPARATOR};
pub use keys::{build_key, build_key_compressed};
pub use message::LogMessage;
