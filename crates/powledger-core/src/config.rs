use crate::constants::{DEFAULT_DIFFICULTY, HASH_HEX_SIZE};
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which pending transactions go into a mined block.
///
/// The pool is cleared after every successful mine regardless of the policy,
/// so `FirstOnly` discards everything past the first entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PoolPolicy {
    /// Package every pending transaction.
    #[default]
    WholePool,
    /// Package only the oldest pending transaction and drop the rest.
    FirstOnly,
}

impl FromStr for PoolPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "whole-pool" | "whole" => Ok(Self::WholePool),
            "first-only" | "first" => Ok(Self::FirstOnly),
            other => Err(format!(
                "unknown pool policy `{other}` (expected `whole-pool` or `first-only`)"
            )),
        }
    }
}

/// How the nonce space is searched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MiningStrategy {
    #[default]
    Sequential,
    /// Batches of nonces are searched across the rayon thread pool.
    Parallel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Leading `'0'` hex digits every mined block hash must carry.
    pub difficulty: usize,
    pub pool_policy: PoolPolicy,
    pub strategy: MiningStrategy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            pool_policy: PoolPolicy::default(),
            strategy: MiningStrategy::default(),
        }
    }
}

impl LedgerConfig {
    pub fn with_difficulty(mut self, difficulty: usize) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_pool_policy(mut self, pool_policy: PoolPolicy) -> Self {
        self.pool_policy = pool_policy;
        self
    }

    pub fn with_strategy(mut self, strategy: MiningStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// A difficulty above the digest width could never be met.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.difficulty > HASH_HEX_SIZE {
            return Err(LedgerError::DifficultyTooHigh {
                requested: self.difficulty,
                max: HASH_HEX_SIZE,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LedgerConfig::default();
        assert_eq!(config.difficulty, 2);
        assert_eq!(config.pool_policy, PoolPolicy::WholePool);
        assert_eq!(config.strategy, MiningStrategy::Sequential);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn difficulty_above_digest_width_is_rejected() {
        let config = LedgerConfig::default().with_difficulty(65);
        assert_eq!(
            config.validate(),
            Err(LedgerError::DifficultyTooHigh {
                requested: 65,
                max: 64
            })
        );
        assert!(LedgerConfig::default().with_difficulty(64).validate().is_ok());
    }

    #[test]
    fn pool_policy_from_str() {
        assert_eq!("whole-pool".parse(), Ok(PoolPolicy::WholePool));
        assert_eq!("FIRST_ONLY".parse(), Ok(PoolPolicy::FirstOnly));
        assert!("everything".parse::<PoolPolicy>().is_err());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: LedgerConfig =
            serde_json::from_str(r#"{"pool_policy":"first-only"}"#).unwrap();
        assert_eq!(config.difficulty, 2);
        assert_eq!(config.pool_policy, PoolPolicy::FirstOnly);
        assert_eq!(config.strategy, MiningStrategy::Sequential);
    }
}
