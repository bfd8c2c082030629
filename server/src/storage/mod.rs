//! In-memory storage engine.
//!
//! All records live in one ordered index, a red-black tree keyed by
//! the hierarchical (table, key, field) comparator. There is no
//! persistence; the process owns the only copy of the data.

pub mod database;
pub mod rbtree;
pub mod record;

pub use database::{Database, RecordIndex};
pub use rbtree::{IndexError, InsertOutcome, NodeId, RbTree};
pub use record::{KeySegments, ProbeKey, RecordKey, RecordValue, compare_keys, compare_segments};
