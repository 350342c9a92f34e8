//! # Relay Configuration
//!
//! Settings for the three pipeline stages. Every field has a default, so a
//! partial JSON document deserializes into a complete configuration.

use crate::domain::FeePolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Complete relay configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Quorum aggregation.
    pub aggregator: AggregatorConfig,
    /// Transaction emission.
    pub transmitter: TransmitterConfig,
    /// Channel sizing.
    pub channels: ChannelConfig,
}

impl RelayConfig {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.aggregator.threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        if self.channels.attestation_buffer == 0 {
            return Err(ConfigError::ZeroBuffer("attestation_buffer"));
        }
        let expected = self.aggregator.expected_messages as u64;
        if self.transmitter.starting_nonce.checked_add(expected).is_none() {
            return Err(ConfigError::NonceOverflow {
                starting_nonce: self.transmitter.starting_nonce,
                expected_messages: self.aggregator.expected_messages,
            });
        }
        if self.transmitter.gas_tip_cap_gwei > self.transmitter.gas_fee_cap_gwei {
            return Err(ConfigError::TipAboveFeeCap {
                tip: self.transmitter.gas_tip_cap_gwei,
                fee_cap: self.transmitter.gas_fee_cap_gwei,
            });
        }
        Ok(())
    }

    /// Check the threshold against the weight the validator set can supply.
    pub fn validate_against(&self, total_weight: u64) -> Result<(), ConfigError> {
        self.validate()?;
        if self.aggregator.threshold > total_weight {
            return Err(ConfigError::UnreachableThreshold {
                threshold: self.aggregator.threshold,
                total_weight,
            });
        }
        Ok(())
    }
}

/// Quorum aggregator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Weight required to certify a message.
    pub threshold: u64,
    /// Certified messages to emit before stopping.
    pub expected_messages: usize,
    /// Pending records kept before the least recently used is dropped
    /// (0 = unbounded).
    pub max_pending_records: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            threshold: 1,
            expected_messages: 1,
            max_pending_records: 10_000,
        }
    }
}

/// Transmitter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmitterConfig {
    /// Destination EVM chain id.
    pub chain_id: u64,
    /// Nonce of the first relay transaction.
    pub starting_nonce: u64,
    /// Max fee per gas, in gwei.
    pub gas_fee_cap_gwei: u64,
    /// Max priority fee per gas, in gwei.
    pub gas_tip_cap_gwei: u64,
}

impl TransmitterConfig {
    pub fn fee_policy(&self) -> FeePolicy {
        FeePolicy::from_gwei(self.gas_fee_cap_gwei, self.gas_tip_cap_gwei)
    }
}

impl Default for TransmitterConfig {
    fn default() -> Self {
        Self {
            chain_id: 99_999,
            starting_nonce: 0,
            gas_fee_cap_gwei: 225,
            gas_tip_cap_gwei: 1,
        }
    }
}

/// Channel capacities.
///
/// The certified-message and transaction channels always hold a single
/// item so the consumer's pace propagates back to the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Shared source → aggregator channel.
    pub attestation_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            attestation_buffer: 64,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Aggregation threshold must be at least 1")]
    ZeroThreshold,

    #[error("Threshold {threshold} exceeds total validator weight {total_weight}")]
    UnreachableThreshold { threshold: u64, total_weight: u64 },

    #[error("Channel capacity `{0}` must be at least 1")]
    ZeroBuffer(&'static str),

    #[error("Starting nonce {starting_nonce} leaves no room for {expected_messages} messages")]
    NonceOverflow {
        starting_nonce: u64,
        expected_messages: usize,
    },

    #[error("Tip cap {tip} gwei exceeds fee cap {fee_cap} gwei")]
    TipAboveFeeCap { tip: u64, fee_cap: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GWEI;
    use primitive_types::U256;

    #[test]
    fn test_defaults_are_valid() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.channels.attestation_buffer, 64);
    }

    #[test]
    fn test_default_fee_policy() {
        let fees = TransmitterConfig::default().fee_policy();
        assert_eq!(fees.gas_fee_cap, U256::from(225u64 * GWEI));
        assert_eq!(fees.gas_tip_cap, U256::from(GWEI));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let mut config = RelayConfig::default();
        config.aggregator.threshold = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroThreshold));
    }

    #[test]
    fn test_unreachable_threshold_rejected() {
        let mut config = RelayConfig::default();
        config.aggregator.threshold = 5;
        assert_eq!(
            config.validate_against(4),
            Err(ConfigError::UnreachableThreshold {
                threshold: 5,
                total_weight: 4
            })
        );
        assert!(config.validate_against(5).is_ok());
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let mut config = RelayConfig::default();
        config.channels.attestation_buffer = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroBuffer("attestation_buffer"))
        );
    }

    #[test]
    fn test_nonce_range_must_fit() {
        let mut config = RelayConfig::default();
        config.aggregator.expected_messages = 2;
        config.transmitter.starting_nonce = u64::MAX - 1;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonceOverflow {
                starting_nonce: u64::MAX - 1,
                expected_messages: 2
            })
        );

        config.transmitter.starting_nonce = u64::MAX - 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: RelayConfig =
            serde_json::from_str(r#"{"aggregator": {"threshold": 3}}"#).unwrap();
        assert_eq!(config.aggregator.threshold, 3);
        assert_eq!(config.aggregator.expected_messages, 1);
        assert_eq!(config.transmitter, TransmitterConfig::default());
    }
}
