//! Pattern-driven workload generator for hierarchical key/value stores.
//!
//! A small pattern language describes a key tree; the engine loads it into
//! the store and then keeps it busy with value churn, subtree churn, level
//! reads and watches until the test end key is written.

pub mod churn;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod engine;
mod errors;
pub mod keyspace;
pub mod metrics;
pub mod pattern;
pub mod stats;
pub mod store;
pub mod utils;
pub mod watch;

pub use errors::*;
