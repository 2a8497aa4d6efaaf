//! Environment-based Configuration
//!
//! Polling intervals, confirmation depths and the forward-derivation
//! safety margin, loaded once at startup and immutable afterwards.
//! Reconfiguration (e.g. a user editing a custom network) replaces the
//! whole [`PoolConfig`], it never mutates one in use by an in-flight poll.
//!
//! # Environment Variables
//!
//! - `BLANKPOOL_POLL_INTERVAL_SECS` - seconds between poll cycles (default: 10)
//! - `BLANKPOOL_MAX_RECEIPT_POLLS` - polls without a receipt before a
//!   pending deposit is considered dropped (default: 30)
//! - `BLANKPOOL_DERIVATIONS_FORWARD` - forward-scan window override
//! - `BLANKPOOL_SCAN_LOOKBACK_BLOCKS` - blocks behind the head a scan
//!   pass queries the commitment log for (default: 10000)
//! - `BLANKPOOL_CONFIRMATIONS_<NETWORK>` - confirmation depth override,
//!   e.g. `BLANKPOOL_CONFIRMATIONS_POLYGON=256`
//! - `BLANKPOOL_LOG_LEVEL` - debug, info, warn, error (default: info)

use std::collections::HashMap;
use std::env;

use thiserror::Error;

use crate::registry::{self, Currency, PoolNetwork};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("no {currency} pool accepts amount {amount}")]
    InvalidPair { currency: Currency, amount: String },

    #[error("currency {currency} has no pool on {network}")]
    CurrencyNotOnNetwork {
        network: PoolNetwork,
        currency: Currency,
    },

    #[error("network {0} not configured")]
    NetworkNotConfigured(PoolNetwork),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Forward derivations to scan past the recorded cursor, guarding against
/// holes in the index sequence left by chain reorganizations.
pub const DERIVATIONS_FORWARD: u64 = 10;

/// Default block confirmations before a deposit counts as final
pub const DEFAULT_DEPOSIT_CONFIRMATIONS: u64 = 4;

/// Default commitment-log lookback per scan pass, in blocks. Deep enough
/// to cover any reorg plus the gap between passes, while keeping each
/// log query bounded.
pub const DEFAULT_SCAN_LOOKBACK_BLOCKS: u64 = 10_000;

/// Per-network pool parameters
#[derive(Debug, Clone)]
pub struct NetworkDescriptor {
    pub network: PoolNetwork,
    pub chain_id: u64,
    /// Currencies with pool instances on this network
    pub currencies: Vec<Currency>,
    /// Blocks atop the deposit block before it is final
    pub deposit_confirmations: u64,
    /// Forward-scan safety margin for this network
    pub derivations_forward: u64,
}

impl NetworkDescriptor {
    /// Built-in parameters for a known network
    pub fn builtin(network: PoolNetwork) -> Self {
        let deposit_confirmations = match network {
            // Polygon reorgs can be very deep
            PoolNetwork::Polygon => 128,
            // BSC: 18 blocks is roughly mainnet's 4 in wall-clock time
            PoolNetwork::Bsc => 18,
            _ => DEFAULT_DEPOSIT_CONFIRMATIONS,
        };

        Self {
            network,
            chain_id: network.chain_id(),
            currencies: registry::currencies_for(network).to_vec(),
            deposit_confirmations,
            derivations_forward: DERIVATIONS_FORWARD,
        }
    }
}

/// Deposit manager configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Seconds between poll cycles
    pub poll_interval_secs: u64,
    /// Polls without a receipt before a pending deposit fails as dropped
    pub max_receipt_polls: u32,
    /// Blocks behind the head each scan pass queries the log for
    pub scan_lookback_blocks: u64,
    /// Log level string passed to the logging layer
    pub log_level: String,
    networks: HashMap<PoolNetwork, NetworkDescriptor>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let networks = PoolNetwork::ALL
            .iter()
            .map(|n| (*n, NetworkDescriptor::builtin(*n)))
            .collect();

        Self {
            poll_interval_secs: 10,
            max_receipt_polls: 30,
            scan_lookback_blocks: DEFAULT_SCAN_LOOKBACK_BLOCKS,
            log_level: "info".to_string(),
            networks,
        }
    }
}

impl PoolConfig {
    /// Load configuration from environment variables, starting from the
    /// built-in defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut config = Self::default();

        if let Ok(v) = env::var("BLANKPOOL_POLL_INTERVAL_SECS") {
            config.poll_interval_secs = v.parse().map_err(|_| {
                ConfigError::InvalidValue("BLANKPOOL_POLL_INTERVAL_SECS".to_string(), v)
            })?;
        }

        if let Ok(v) = env::var("BLANKPOOL_MAX_RECEIPT_POLLS") {
            config.max_receipt_polls = v.parse().map_err(|_| {
                ConfigError::InvalidValue("BLANKPOOL_MAX_RECEIPT_POLLS".to_string(), v)
            })?;
        }

        if let Ok(v) = env::var("BLANKPOOL_SCAN_LOOKBACK_BLOCKS") {
            config.scan_lookback_blocks = v.parse().map_err(|_| {
                ConfigError::InvalidValue("BLANKPOOL_SCAN_LOOKBACK_BLOCKS".to_string(), v)
            })?;
        }

        if let Ok(v) = env::var("BLANKPOOL_DERIVATIONS_FORWARD") {
            let forward: u64 = v.parse().map_err(|_| {
                ConfigError::InvalidValue("BLANKPOOL_DERIVATIONS_FORWARD".to_string(), v)
            })?;
            for descriptor in config.networks.values_mut() {
                descriptor.derivations_forward = forward;
            }
        }

        for network in PoolNetwork::ALL {
            let var = format!("BLANKPOOL_CONFIRMATIONS_{}", network.name().to_uppercase());
            if let Ok(v) = env::var(&var) {
                let depth: u64 = v
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(var.clone(), v))?;
                if let Some(descriptor) = config.networks.get_mut(&network) {
                    descriptor.deposit_confirmations = depth;
                }
            }
        }

        if let Ok(v) = env::var("BLANKPOOL_LOG_LEVEL") {
            config.log_level = v;
        }

        Ok(config)
    }

    /// Descriptor for a configured network
    pub fn network(&self, network: PoolNetwork) -> Result<&NetworkDescriptor, ConfigError> {
        self.networks
            .get(&network)
            .ok_or(ConfigError::NetworkNotConfigured(network))
    }

    /// Confirmation depth for a network
    pub fn confirmation_depth(&self, network: PoolNetwork) -> Result<u64, ConfigError> {
        Ok(self.network(network)?.deposit_confirmations)
    }

    /// Forward-scan window for a network
    pub fn derivations_forward(&self, network: PoolNetwork) -> Result<u64, ConfigError> {
        Ok(self.network(network)?.derivations_forward)
    }

    /// All configured networks
    pub fn networks(&self) -> impl Iterator<Item = &NetworkDescriptor> {
        self.networks.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_confirmation_depths() {
        let config = PoolConfig::default();
        assert_eq!(config.confirmation_depth(PoolNetwork::Mainnet).unwrap(), 4);
        assert_eq!(config.confirmation_depth(PoolNetwork::Bsc).unwrap(), 18);
        assert_eq!(
            config.confirmation_depth(PoolNetwork::Polygon).unwrap(),
            128
        );
    }

    #[test]
    fn test_forward_margin_default() {
        let config = PoolConfig::default();
        for network in PoolNetwork::ALL {
            assert_eq!(config.derivations_forward(network).unwrap(), 10);
        }
    }

    #[test]
    fn test_descriptor_currencies_match_registry() {
        let descriptor = NetworkDescriptor::builtin(PoolNetwork::Polygon);
        assert_eq!(descriptor.currencies, vec![Currency::Matic]);
        assert_eq!(descriptor.chain_id, 137);
    }
}
