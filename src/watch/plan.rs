use rand::Rng;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::constants::WATCH_ALL;
use crate::errors::DefinitionError;
use crate::keyspace::KeySpace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchCount {
    Count(usize),
    /// Every prefix present at the level
    All,
}

/// Watchers per level as configured, e.g. `"1,5,n"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchCounts {
    counts: Vec<WatchCount>,
    strict: bool,
}

impl WatchCounts {
    /// Parses a comma separated count list.
    ///
    /// Entries that are neither an integer nor `n` are rejected when `strict`
    /// is set and count as 0 otherwise.
    pub fn parse(
        spec: &str,
        strict: bool,
    ) -> Result<Self, DefinitionError> {
        let counts = spec
            .split(',')
            .map(str::trim)
            .map(|entry| {
                if entry == WATCH_ALL {
                    return Ok(WatchCount::All);
                }
                match entry.parse::<usize>() {
                    Ok(n) => Ok(WatchCount::Count(n)),
                    Err(_) if strict => Err(DefinitionError::InvalidWatchCount(entry.to_string())),
                    Err(_) => {
                        warn!(entry, "Watch count is not an integer, this level will have 0 watchers");
                        Ok(WatchCount::Count(0))
                    }
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { counts, strict })
    }

    /// Number of levels listed
    pub fn levels(&self) -> usize {
        self.counts.len()
    }

    /// Counts for a tree of `depth` levels.
    ///
    /// Extra entries are dropped and missing levels get no watchers, unless
    /// the list was parsed strictly, in which case any mismatch is an error.
    pub fn for_depth(
        &self,
        depth: usize,
    ) -> Result<Vec<WatchCount>, DefinitionError> {
        if self.counts.len() != depth {
            if self.strict {
                return Err(DefinitionError::WatchLevelMismatch {
                    levels: self.counts.len(),
                    depth,
                });
            }
            warn!(
                levels = self.counts.len(),
                depth, "Watch counts don't match the pattern levels; extra levels are ignored, missing levels get 0"
            );
        }
        Ok((0..depth)
            .map(|level| self.counts.get(level).copied().unwrap_or(WatchCount::Count(0)))
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    pub level: usize,
    pub key: String,
}

/// The keys to watch, level by level
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchPlan {
    targets: Vec<WatchTarget>,
}

impl WatchPlan {
    /// Picks the watched keys of every level.
    ///
    /// A level whose count equals its number of prefixes watches each of
    /// them once. Otherwise keys are drawn at random, or in order wrapping
    /// around when `sequential` is set.
    pub fn build(
        keyspace: &KeySpace,
        counts: &WatchCounts,
        sequential: bool,
        rng: &mut impl Rng,
    ) -> Result<Self, DefinitionError> {
        let depth = keyspace.max_depth();
        let mut targets = Vec::new();

        for (level, count) in counts.for_depth(depth)?.into_iter().enumerate() {
            let available = keyspace.prefixes(level);
            let count = match count {
                WatchCount::All => available.len(),
                WatchCount::Count(n) => n,
            };
            if count == 0 {
                continue;
            }
            debug!(level, count, available = available.len(), "Selecting watched keys");

            if count == available.len() {
                targets.extend(available.iter().map(|key| WatchTarget {
                    level,
                    key: key.clone(),
                }));
                continue;
            }
            if available.is_empty() {
                return Err(DefinitionError::EmptyLevel(level));
            }

            for i in 0..count {
                let index = if sequential {
                    i % available.len()
                } else {
                    rng.gen_range(0..available.len())
                };
                targets.push(WatchTarget {
                    level,
                    key: available[index].clone(),
                });
            }
        }

        info!(watchers = targets.len(), "Watch plan ready");
        Ok(Self { targets })
    }

    pub fn targets(&self) -> &[WatchTarget] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
