use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::Rng;
use tonic::async_trait;
use tracing::trace;

use super::Activity;
use crate::config::GetConfig;
use crate::dispatcher::OpSender;
use crate::errors::DefinitionError;
use crate::keyspace::KeySpace;
use crate::store::Operation;

/// Reads a random prefix at one level on every tick.
///
/// Above the leaf level the read covers the whole subtree.
#[derive(Debug)]
pub struct GetLevel {
    prefixes: Arc<[String]>,
    leaf: bool,
    serializable: bool,
    keys_only: bool,
    rate: u64,
}

impl GetLevel {
    pub fn new(
        keyspace: &KeySpace,
        config: &GetConfig,
        rate: u64,
    ) -> Result<Self, DefinitionError> {
        let pattern = keyspace.single_pattern("Get level")?;
        let Some(rule) = pattern.rule(config.level) else {
            return Err(DefinitionError::LevelTooDeep {
                activity: "Get level",
                level: config.level,
                depth: pattern.depth(),
            });
        };
        let leaf = rule.is_leaf();
        let prefixes = keyspace.prefixes(config.level);
        if prefixes.is_empty() {
            return Err(DefinitionError::EmptyLevel(config.level));
        }
        Ok(Self {
            prefixes,
            leaf,
            serializable: config.serializable,
            keys_only: config.keys_only,
            rate,
        })
    }

    /// The read issued for `key`
    pub fn operation(
        &self,
        key: &str,
    ) -> Operation {
        Operation::Get {
            key: key.to_string(),
            prefix: !self.leaf,
            serializable: self.serializable,
            keys_only: self.keys_only,
        }
    }
}

#[async_trait]
impl Activity for GetLevel {
    fn name(&self) -> &'static str {
        "get_level"
    }

    fn rate(&self) -> u64 {
        self.rate
    }

    async fn step(
        &mut self,
        sender: &OpSender,
        rng: &mut SmallRng,
    ) -> bool {
        let key = &self.prefixes[rng.gen_range(0..self.prefixes.len())];
        trace!(%key, "Get level read");
        sender.send(self.operation(key)).await
    }
}
