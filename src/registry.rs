//! Currency / Denomination Registry
//!
//! Static tables describing which currencies each pool network supports and
//! which discrete deposit amounts exist per currency. Pool contracts only
//! accept deposits at these fixed denominations, so a (currency, amount)
//! pair that is not in the table can never be represented as a
//! [`CurrencyAmountPair`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Currencies with deployed pool instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Eth,
    Dai,
    Cdai,
    Usdc,
    Usdt,
    Wbtc,
    Matic,
    Bnb,
    Xdai,
    Avax,
}

impl Currency {
    /// All known currencies, in registry order
    pub const ALL: [Currency; 10] = [
        Currency::Eth,
        Currency::Dai,
        Currency::Cdai,
        Currency::Usdc,
        Currency::Usdt,
        Currency::Wbtc,
        Currency::Matic,
        Currency::Bnb,
        Currency::Xdai,
        Currency::Avax,
    ];

    /// Whether this is the chain-native currency on some network
    /// (as opposed to an ERC-20 pool)
    pub fn is_native(&self) -> bool {
        matches!(
            self,
            Currency::Eth | Currency::Matic | Currency::Bnb | Currency::Xdai | Currency::Avax
        )
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Currency::Eth => "eth",
            Currency::Dai => "dai",
            Currency::Cdai => "cdai",
            Currency::Usdc => "usdc",
            Currency::Usdt => "usdt",
            Currency::Wbtc => "wbtc",
            Currency::Matic => "matic",
            Currency::Bnb => "bnb",
            Currency::Xdai => "xdai",
            Currency::Avax => "avax",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Currency {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "eth" => Ok(Currency::Eth),
            "dai" => Ok(Currency::Dai),
            "cdai" => Ok(Currency::Cdai),
            "usdc" => Ok(Currency::Usdc),
            "usdt" => Ok(Currency::Usdt),
            "wbtc" => Ok(Currency::Wbtc),
            "matic" => Ok(Currency::Matic),
            "bnb" => Ok(Currency::Bnb),
            "xdai" => Ok(Currency::Xdai),
            "avax" => Ok(Currency::Avax),
            other => Err(ConfigError::UnknownCurrency(other.to_string())),
        }
    }
}

/// Networks with deployed pool contracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolNetwork {
    Mainnet,
    Goerli,
    Polygon,
    Bsc,
    Xdai,
    Arbitrum,
    #[serde(rename = "avalanchec")]
    AvalancheC,
    Optimism,
}

impl PoolNetwork {
    /// All networks with pool deployments
    pub const ALL: [PoolNetwork; 8] = [
        PoolNetwork::Mainnet,
        PoolNetwork::Goerli,
        PoolNetwork::Polygon,
        PoolNetwork::Bsc,
        PoolNetwork::Xdai,
        PoolNetwork::Arbitrum,
        PoolNetwork::AvalancheC,
        PoolNetwork::Optimism,
    ];

    /// Numeric chain identifier
    pub fn chain_id(&self) -> u64 {
        match self {
            PoolNetwork::Mainnet => 1,
            PoolNetwork::Goerli => 5,
            PoolNetwork::Polygon => 137,
            PoolNetwork::Bsc => 56,
            PoolNetwork::Xdai => 100,
            PoolNetwork::Arbitrum => 42161,
            PoolNetwork::AvalancheC => 43114,
            PoolNetwork::Optimism => 10,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PoolNetwork::Mainnet => "mainnet",
            PoolNetwork::Goerli => "goerli",
            PoolNetwork::Polygon => "polygon",
            PoolNetwork::Bsc => "bsc",
            PoolNetwork::Xdai => "xdai",
            PoolNetwork::Arbitrum => "arbitrum",
            PoolNetwork::AvalancheC => "avalanchec",
            PoolNetwork::Optimism => "optimism",
        }
    }
}

impl fmt::Display for PoolNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PoolNetwork {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" => Ok(PoolNetwork::Mainnet),
            "goerli" => Ok(PoolNetwork::Goerli),
            "polygon" => Ok(PoolNetwork::Polygon),
            "bsc" => Ok(PoolNetwork::Bsc),
            "xdai" => Ok(PoolNetwork::Xdai),
            "arbitrum" => Ok(PoolNetwork::Arbitrum),
            "avalanchec" => Ok(PoolNetwork::AvalancheC),
            "optimism" => Ok(PoolNetwork::Optimism),
            other => Err(ConfigError::UnknownNetwork(other.to_string())),
        }
    }
}

/// Allowed deposit denominations for a currency, smallest first.
///
/// Amounts are kept as decimal strings: they name pool instances, they are
/// never arithmetic operands, and "0.1" must not drift through float
/// conversion.
pub fn allowed_amounts(currency: Currency) -> &'static [&'static str] {
    match currency {
        Currency::Eth => &["0.1", "1", "10", "100"],
        Currency::Dai => &["100", "1000", "10000", "100000"],
        Currency::Cdai => &["5000", "50000", "500000", "5000000"],
        Currency::Usdc => &["100", "1000"],
        Currency::Usdt => &["100", "1000"],
        Currency::Wbtc => &["0.1", "1", "10"],
        Currency::Matic => &["100", "1000", "10000", "100000"],
        Currency::Bnb => &["0.1", "1", "10", "100"],
        Currency::Xdai => &["100", "1000", "10000", "100000"],
        Currency::Avax => &["10", "100", "500"],
    }
}

/// Currencies with pool instances on the given network
pub fn currencies_for(network: PoolNetwork) -> &'static [Currency] {
    match network {
        PoolNetwork::Mainnet | PoolNetwork::Goerli => &[
            Currency::Eth,
            Currency::Dai,
            Currency::Cdai,
            Currency::Usdc,
            Currency::Usdt,
            Currency::Wbtc,
        ],
        PoolNetwork::Polygon => &[Currency::Matic],
        PoolNetwork::Bsc => &[Currency::Bnb],
        PoolNetwork::Xdai => &[Currency::Xdai],
        PoolNetwork::Arbitrum | PoolNetwork::Optimism => &[Currency::Eth],
        PoolNetwork::AvalancheC => &[Currency::Avax],
    }
}

/// Check that a (network, currency, amount) triple maps to a deployed
/// pool instance. Unknown combinations return false, never an error.
pub fn valid_pair(network: PoolNetwork, currency: Currency, amount: &str) -> bool {
    currencies_for(network).contains(&currency) && allowed_amounts(currency).contains(&amount)
}

/// A validated currency/denomination pair.
///
/// Fields are private: the only way to obtain one is through
/// [`CurrencyAmountPair::new`], so an in-memory pair always refers to a
/// real pool denomination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPair")]
pub struct CurrencyAmountPair {
    currency: Currency,
    amount: String,
}

#[derive(Deserialize)]
struct RawPair {
    currency: Currency,
    amount: String,
}

impl TryFrom<RawPair> for CurrencyAmountPair {
    type Error = ConfigError;

    fn try_from(raw: RawPair) -> Result<Self, Self::Error> {
        CurrencyAmountPair::new(raw.currency, &raw.amount)
    }
}

impl CurrencyAmountPair {
    /// Build a pair, rejecting amounts outside the currency's
    /// denomination grid.
    pub fn new(currency: Currency, amount: &str) -> Result<Self, ConfigError> {
        if !allowed_amounts(currency).contains(&amount) {
            return Err(ConfigError::InvalidPair {
                currency,
                amount: amount.to_string(),
            });
        }
        Ok(Self {
            currency,
            amount: amount.to_string(),
        })
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }
}

impl fmt::Display for CurrencyAmountPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.currency, self.amount)
    }
}

/// A (network, currency, amount) triple: the unit of index sequencing,
/// lifecycle tracking and withdrawal selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBucket")]
pub struct Bucket {
    network: PoolNetwork,
    pair: CurrencyAmountPair,
}

#[derive(Deserialize)]
struct RawBucket {
    network: PoolNetwork,
    pair: CurrencyAmountPair,
}

impl TryFrom<RawBucket> for Bucket {
    type Error = ConfigError;

    fn try_from(raw: RawBucket) -> Result<Self, Self::Error> {
        Bucket::new(raw.network, raw.pair)
    }
}

impl Bucket {
    /// Build a bucket, rejecting currencies not deployed on the network.
    pub fn new(network: PoolNetwork, pair: CurrencyAmountPair) -> Result<Self, ConfigError> {
        if !currencies_for(network).contains(&pair.currency()) {
            return Err(ConfigError::CurrencyNotOnNetwork {
                network,
                currency: pair.currency(),
            });
        }
        Ok(Self { network, pair })
    }

    pub fn network(&self) -> PoolNetwork {
        self.network
    }

    pub fn pair(&self) -> &CurrencyAmountPair {
        &self.pair
    }

    pub fn currency(&self) -> Currency {
        self.pair.currency()
    }

    pub fn amount(&self) -> &str {
        self.pair.amount()
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.pair)
    }
}
