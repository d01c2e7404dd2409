//! Pattern language compiler.
//!
//! A pattern describes a key tree level by level. Each level becomes a
//! [`PatternRule`] that knows how many instances it has and how to name
//! them; the last level also knows how to produce values.
//!
//! Randomness is always drawn from a caller supplied source so a seeded run
//! is reproducible.

mod compiler;
mod format;
mod generator;
mod rule;
mod value;

pub use compiler::*;
pub use format::*;
pub use generator::*;
pub use rule::*;
pub use value::*;

#[cfg(test)]
mod value_test;
