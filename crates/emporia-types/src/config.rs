//! Configuration types for Emporia markets.
//!
//! The whole process is described by one [`EmporiaConfig`] value handed to
//! the registry at construction. Where it comes from (file, env, flags) is the
//! caller's business.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, Asset, EmporiaError, Item, MarketName, Result, RoundTiming, constants};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmporiaConfig {
    /// Markets to run. Names must be unique.
    pub markets: Vec<MarketConfig>,
    /// Round timing shared by all markets.
    #[serde(default)]
    pub round: RoundTiming,
    /// Program sandbox limits.
    #[serde(default)]
    pub vm: VmLimits,
    /// Admission limits for ENTER/OFFER.
    #[serde(default)]
    pub admission: AdmissionLimits,
    /// Secrets scrubbed from program output.
    #[serde(default)]
    pub redaction: RedactionConfig,
    /// Depth of each market's inbound command queue.
    #[serde(default = "default_queue_depth")]
    pub command_queue_depth: usize,
}

fn default_queue_depth() -> usize {
    constants::DEFAULT_COMMAND_QUEUE_DEPTH
}

impl Default for EmporiaConfig {
    fn default() -> Self {
        Self {
            markets: vec![MarketConfig::named(constants::DEFAULT_MARKET_NAME)],
            round: RoundTiming::default(),
            vm: VmLimits::default(),
            admission: AdmissionLimits::default(),
            redaction: RedactionConfig::default(),
            command_queue_depth: constants::DEFAULT_COMMAND_QUEUE_DEPTH,
        }
    }
}

impl EmporiaConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde can't express.
    pub fn validate(&self) -> Result<()> {
        if self.markets.is_empty() {
            return Err(EmporiaError::Configuration("no markets configured".into()));
        }
        let mut names = BTreeSet::new();
        for market in &self.markets {
            if !names.insert(&market.name) {
                return Err(EmporiaError::Configuration(format!(
                    "duplicate market name: {}",
                    market.name
                )));
            }
            market.validate()?;
        }
        let t = &self.round;
        if t.entering.is_zero() || t.offering.is_zero() || t.leaving.is_zero() || t.tick.is_zero() {
            return Err(EmporiaError::Configuration(
                "entering, offering, leaving and tick durations must be non-zero".into(),
            ));
        }
        if t.retention < t.leaving {
            return Err(EmporiaError::Configuration(
                "retention must be at least as long as the leaving phase".into(),
            ));
        }
        if self.vm.fuel == 0 {
            return Err(EmporiaError::Configuration("vm.fuel must be non-zero".into()));
        }
        if self.command_queue_depth == 0 {
            return Err(EmporiaError::Configuration(
                "command_queue_depth must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Per-market configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    pub name: MarketName,
    /// Counterparty of every intent in this market.
    pub house: GenesisAccount,
    /// Accounts opened when the market starts.
    #[serde(default)]
    pub accounts: Vec<GenesisAccount>,
}

impl MarketConfig {
    /// An empty market whose house account has a fixed ID and no holder key.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: MarketName::new(name),
            house: GenesisAccount {
                id: AccountId::from_bytes([0u8; 16]),
                holder_key_hex: hex::encode([0u8; 32]),
                balances: BTreeMap::new(),
                holdings: BTreeMap::new(),
            },
            accounts: Vec::new(),
        }
    }

    fn validate(&self) -> Result<()> {
        let mut ids = BTreeSet::new();
        ids.insert(self.house.id);
        self.house.holder_key()?;
        self.house.check_amounts()?;
        for account in &self.accounts {
            if !ids.insert(account.id) {
                return Err(EmporiaError::Configuration(format!(
                    "market {}: duplicate account {}",
                    self.name, account.id
                )));
            }
            account.holder_key()?;
            account.check_amounts()?;
        }
        Ok(())
    }
}

/// An account to open at market start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub id: AccountId,
    /// Hex-encoded 32-byte ed25519 verifying key.
    pub holder_key_hex: String,
    #[serde(default)]
    pub balances: BTreeMap<Asset, Decimal>,
    #[serde(default)]
    pub holdings: BTreeMap<Item, Decimal>,
}

impl GenesisAccount {
    /// Decode the holder key.
    pub fn holder_key(&self) -> Result<[u8; 32]> {
        let bytes = hex::decode(&self.holder_key_hex).map_err(|e| {
            EmporiaError::Configuration(format!("account {}: bad holder key: {e}", self.id))
        })?;
        bytes.try_into().map_err(|_| {
            EmporiaError::Configuration(format!("account {}: holder key must be 32 bytes", self.id))
        })
    }

    fn check_amounts(&self) -> Result<()> {
        let negative = self
            .balances
            .values()
            .chain(self.holdings.values())
            .any(Decimal::is_sign_negative);
        if negative {
            return Err(EmporiaError::Configuration(format!(
                "account {}: negative genesis amount",
                self.id
            )));
        }
        Ok(())
    }
}

/// Bounds applied to every program run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmLimits {
    /// Instructions a program may execute.
    pub fuel: u64,
    /// Data stack depth.
    pub max_stack: usize,
    /// Nested word calls.
    pub max_call_depth: usize,
    /// Intents a program may emit.
    pub max_intents: usize,
    /// Screen buffer size in bytes.
    pub screen_bytes: usize,
}

impl Default for VmLimits {
    fn default() -> Self {
        Self {
            fuel: constants::DEFAULT_FUEL,
            max_stack: constants::DEFAULT_MAX_STACK,
            max_call_depth: constants::DEFAULT_MAX_CALL_DEPTH,
            max_intents: constants::DEFAULT_MAX_INTENTS,
            screen_bytes: constants::DEFAULT_SCREEN_BYTES,
        }
    }
}

/// Limits enforced when participants ENTER and OFFER.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionLimits {
    pub max_programs_per_offer: usize,
    pub max_programs_per_trader: usize,
    pub max_programs_per_round: usize,
    pub max_code_bytes: usize,
    pub max_accounts_per_program: usize,
    pub max_participants: usize,
}

impl Default for AdmissionLimits {
    fn default() -> Self {
        Self {
            max_programs_per_offer: constants::MAX_PROGRAMS_PER_OFFER,
            max_programs_per_trader: constants::MAX_PROGRAMS_PER_TRADER,
            max_programs_per_round: constants::MAX_PROGRAMS_PER_ROUND,
            max_code_bytes: constants::MAX_CODE_BYTES,
            max_accounts_per_program: constants::MAX_ACCOUNTS_PER_PROGRAM,
            max_participants: constants::MAX_PARTICIPANTS,
        }
    }
}

/// Secret values that must never appear in program output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionConfig {
    /// Label → secret value, or section → (label → value). Occurrences of
    /// a value are replaced by `[label]`.
    #[serde(default)]
    pub secrets: BTreeMap<String, SecretEntry>,
}

/// One entry of [`RedactionConfig::secrets`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SecretEntry {
    Value(String),
    Section(BTreeMap<String, String>),
}

impl RedactionConfig {
    /// Every `(label, value)` pair. Section entries keep their inner label.
    #[must_use]
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        for (label, entry) in &self.secrets {
            match entry {
                SecretEntry::Value(value) => out.push((label.as_str(), value.as_str())),
                SecretEntry::Section(section) => out.extend(
                    section
                        .iter()
                        .map(|(label, value)| (label.as_str(), value.as_str())),
                ),
            }
        }
        out
    }
}
