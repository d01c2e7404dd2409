use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::Rng;
use tonic::async_trait;
use tracing::debug;
use tracing::trace;

use super::Activity;
use crate::dispatcher::OpSender;
use crate::errors::DefinitionError;
use crate::keyspace::KeyIter;
use crate::keyspace::KeySpace;
use crate::pattern::CompiledPattern;
use crate::store::Operation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChurnStep {
    /// Delete every key below the prefix at this index
    Delete(usize),
    /// Recreate the subtree below the prefix at this index
    Recreate(usize),
}

/// Slot bookkeeping for level churn.
///
/// A cycle first deletes `churn_count` distinct prefixes, one per step, then
/// recreates them in the same order. A prefix stays in its slot from its
/// delete until its recreate, so at most `churn_count` subtrees are missing
/// at any time.
#[derive(Debug)]
pub struct LevelChurn {
    prefixes: usize,
    slots: Vec<Option<usize>>,
    deleted: HashSet<usize>,
    cursor: usize,
    deleting: bool,
}

impl LevelChurn {
    pub fn new(
        prefixes: usize,
        pct: u32,
    ) -> Self {
        let mut churn_count = (prefixes * pct as usize / 100).min(prefixes);
        if churn_count == 0 && prefixes > 0 && pct > 0 {
            churn_count = 1;
        }
        Self {
            prefixes,
            slots: vec![None; churn_count],
            deleted: HashSet::with_capacity(churn_count),
            cursor: 0,
            deleting: true,
        }
    }

    pub fn churn_count(&self) -> usize {
        self.slots.len()
    }

    /// Prefixes deleted and not yet recreated
    pub fn outstanding(&self) -> usize {
        self.deleted.len()
    }

    pub fn next_step(
        &mut self,
        rng: &mut impl Rng,
    ) -> Option<ChurnStep> {
        if self.slots.is_empty() {
            return None;
        }

        let step = if self.deleting {
            let index = loop {
                let candidate = rng.gen_range(0..self.prefixes);
                if !self.deleted.contains(&candidate) {
                    break candidate;
                }
            };
            self.deleted.insert(index);
            self.slots[self.cursor] = Some(index);
            ChurnStep::Delete(index)
        } else {
            let index = self.slots[self.cursor].take()?;
            self.deleted.remove(&index);
            ChurnStep::Recreate(index)
        };

        self.cursor += 1;
        if self.cursor == self.slots.len() {
            self.cursor = 0;
            self.deleting = !self.deleting;
        }
        Some(step)
    }
}

/// Deletes and recreates whole subtrees below one level
#[derive(Debug)]
pub struct LevelChurnActivity {
    pattern: CompiledPattern,
    level: usize,
    prefixes: Arc<[String]>,
    state: LevelChurn,
    rate: u64,
}

impl LevelChurnActivity {
    pub fn new(
        keyspace: &KeySpace,
        level: usize,
        pct: u32,
        rate: u64,
    ) -> Result<Self, DefinitionError> {
        let pattern = keyspace.single_pattern("Level churn")?.clone();
        if level + 1 >= pattern.depth() {
            return Err(DefinitionError::LevelTooDeep {
                activity: "Level churn",
                level,
                depth: pattern.depth(),
            });
        }
        let prefixes = keyspace.prefixes(level);
        if prefixes.is_empty() {
            return Err(DefinitionError::EmptyLevel(level));
        }

        let state = LevelChurn::new(prefixes.len(), pct);
        debug!(
            level,
            prefixes = prefixes.len(),
            churn_count = state.churn_count(),
            "Level churn prepared"
        );
        Ok(Self {
            pattern,
            level,
            prefixes,
            state,
            rate,
        })
    }

    pub fn churn_count(&self) -> usize {
        self.state.churn_count()
    }

    pub fn outstanding(&self) -> usize {
        self.state.outstanding()
    }
}

#[async_trait]
impl Activity for LevelChurnActivity {
    fn name(&self) -> &'static str {
        "level_churn"
    }

    fn rate(&self) -> u64 {
        self.rate
    }

    async fn step(
        &mut self,
        sender: &OpSender,
        rng: &mut SmallRng,
    ) -> bool {
        match self.state.next_step(rng) {
            None => false,
            Some(ChurnStep::Delete(index)) => {
                let prefix = &self.prefixes[index];
                trace!(%prefix, "Level churn delete");
                sender.send(Operation::delete_prefix(prefix.as_str())).await
            }
            Some(ChurnStep::Recreate(index)) => {
                let prefix = &self.prefixes[index];
                trace!(%prefix, "Level churn recreate");
                let subtree = KeyIter::new(&self.pattern, &mut *rng).starting_at(prefix, self.level + 1);
                for entry in subtree {
                    if !sender.send(Operation::put(entry.key, entry.value.unwrap_or_default())).await {
                        return false;
                    }
                }
                true
            }
        }
    }
}
