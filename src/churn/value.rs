use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::Rng;
use tonic::async_trait;
use tracing::trace;

use super::Activity;
use crate::dispatcher::OpSender;
use crate::errors::DefinitionError;
use crate::keyspace::KeySpace;
use crate::pattern::CompiledPattern;
use crate::store::Operation;

/// Rewrites the value of a random existing leaf key on every tick
#[derive(Debug)]
pub struct ValueChurn {
    pattern: CompiledPattern,
    keys: Arc<[String]>,
    rate: u64,
}

impl ValueChurn {
    pub fn new(
        keyspace: &KeySpace,
        rate: u64,
    ) -> Result<Self, DefinitionError> {
        let pattern = keyspace.single_pattern("Value churn")?.clone();
        let leaf_level = pattern.depth() - 1;
        let keys = keyspace.prefixes(leaf_level);
        if keys.is_empty() {
            return Err(DefinitionError::EmptyLevel(leaf_level));
        }
        Ok(Self { pattern, keys, rate })
    }
}

#[async_trait]
impl Activity for ValueChurn {
    fn name(&self) -> &'static str {
        "value_churn"
    }

    fn rate(&self) -> u64 {
        self.rate
    }

    async fn step(
        &mut self,
        sender: &OpSender,
        rng: &mut SmallRng,
    ) -> bool {
        let key = &self.keys[rng.gen_range(0..self.keys.len())];
        let value = self.pattern.leaf().generate_value(rng);
        trace!(%key, "Value churn put");
        sender.send(Operation::put(key.as_str(), value)).await
    }
}
