//! Key space enumeration.
//!
//! [`KeySpace`] owns the compiled patterns and answers two questions:
//! which keys to put (bounded, restartable enumeration) and which prefixes
//! exist at a given level (memoized for churn, reads and watches).

mod bounded;
mod iter;

pub use bounded::*;
pub(crate) use iter::KeyCursor;
pub use iter::*;


use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::RngCore;
use rand::SeedableRng;
use tracing::debug;

use crate::errors::DefinitionError;
use crate::pattern::CompiledPattern;

#[derive(Debug)]
pub struct KeySpace {
    patterns: Vec<CompiledPattern>,
    seed: u64,
    /// Prefix lists per level, populated on first access.
    ///
    /// Population happens under the lock so concurrent first callers see a
    /// single consistent list.
    prefix_cache: Mutex<HashMap<usize, Arc<[String]>>>,
}

impl KeySpace {
    pub fn new(
        patterns: Vec<CompiledPattern>,
        seed: u64,
    ) -> Result<Self, DefinitionError> {
        if patterns.is_empty() {
            return Err(DefinitionError::NoPatterns);
        }
        Ok(Self {
            patterns,
            seed,
            prefix_cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn patterns(&self) -> &[CompiledPattern] {
        &self.patterns
    }

    /// Depth of the deepest pattern
    pub fn max_depth(&self) -> usize {
        self.patterns.iter().map(|p| p.depth()).max().unwrap_or(0)
    }

    /// Total number of distinct leaf keys over all patterns
    pub fn key_space(&self) -> usize {
        self.patterns.iter().fold(0usize, |acc, p| acc.saturating_add(p.key_space()))
    }

    /// The only pattern, for activities that cannot mix patterns
    pub fn single_pattern(
        &self,
        activity: &'static str,
    ) -> Result<&CompiledPattern, DefinitionError> {
        match self.patterns.as_slice() {
            [pattern] => Ok(pattern),
            patterns => Err(DefinitionError::MultiplePatterns {
                activity,
                count: patterns.len(),
            }),
        }
    }

    /// Leaf keys to load, stopping after `total` (0 = one full pass)
    pub fn keys<R: RngCore>(
        &self,
        total: usize,
        rng: R,
    ) -> BoundedKeys<'_, R> {
        BoundedKeys::new(&self.patterns, total, rng)
    }

    /// Every key or prefix present at `level`, in enumeration order.
    ///
    /// Random segments are drawn once and then served from the cache.
    pub fn prefixes(
        &self,
        level: usize,
    ) -> Arc<[String]> {
        let mut cache = self.prefix_cache.lock();
        if let Some(prefixes) = cache.get(&level) {
            return prefixes.clone();
        }

        let mut rng = SmallRng::seed_from_u64(self.seed ^ level as u64);
        let prefixes: Arc<[String]> = self
            .patterns
            .iter()
            .flat_map(|p| {
                let iter = KeyIter::new(p, &mut rng).stop_at(level);
                iter.filter(|e| e.level == level).map(|e| e.key).collect::<Vec<_>>()
            })
            .collect();

        debug!(level, count = prefixes.len(), "Cached key prefixes");
        cache.insert(level, prefixes.clone());
        prefixes
    }

    /// Textual listing of every prefix at `level`, one per line
    pub fn key_list(
        &self,
        level: usize,
    ) -> String {
        let prefixes = self.prefixes(level);
        let mut out = String::new();
        for p in prefixes.iter() {
            out.push_str(p);
            out.push('\n');
        }
        out
    }
}
