//! Operation statistics.
//!
//! Every observation lands in two views at once: the lifetime view used for
//! the final summary and the interval view that periodic reports drain.

mod aggregator;
mod latency;
mod report;

pub use aggregator::*;
pub use latency::*;
pub use report::*;
