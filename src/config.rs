use std::str::FromStr;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;

/// Reserved identity of the clearing account that receives all purchase proceeds
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct TreasuryConfig {
    pub owner_id: String,
    pub account_number: String,
}

impl Default for TreasuryConfig {
    fn default() -> Self {
        Self {
            owner_id: "platform-treasury".to_string(),
            account_number: "TRS-0000000001".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub db_max_connections: u32,
    pub treasury: TreasuryConfig,
    /// ISO code of the single currency wallets are held in
    pub wallet_currency: String,
    /// Native decimal places of `wallet_currency`
    pub currency_scale: u32,
    pub lock_timeout_ms: u64,
    pub recovery_interval_secs: u64,
    pub recovery_grace_secs: u64,
    pub recovery_lookback_hours: u64,
    /// Unfulfilled orders re-driven per sweep
    pub recovery_batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost/wallet".to_string(),
            bind_address: "0.0.0.0:8080".to_string(),
            db_max_connections: 50,
            treasury: TreasuryConfig::default(),
            wallet_currency: "OMR".to_string(),
            currency_scale: 3,
            lock_timeout_ms: 5_000,
            recovery_interval_secs: 300,
            recovery_grace_secs: 60,
            recovery_lookback_hours: 72,
            recovery_batch_size: 100,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_address: std::env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            treasury: TreasuryConfig {
                owner_id: std::env::var("TREASURY_OWNER_ID")
                    .unwrap_or(defaults.treasury.owner_id),
                account_number: std::env::var("TREASURY_ACCOUNT_NUMBER")
                    .unwrap_or(defaults.treasury.account_number),
            },
            wallet_currency: std::env::var("WALLET_CURRENCY")
                .map(|c| c.to_uppercase())
                .unwrap_or(defaults.wallet_currency),
            currency_scale: parse_var("CURRENCY_SCALE", defaults.currency_scale)?,
            lock_timeout_ms: parse_var("LOCK_TIMEOUT_MS", defaults.lock_timeout_ms)?,
            recovery_interval_secs: parse_var(
                "RECOVERY_INTERVAL_SECS",
                defaults.recovery_interval_secs,
            )?,
            recovery_grace_secs: parse_var("RECOVERY_GRACE_SECS", defaults.recovery_grace_secs)?,
            recovery_lookback_hours: parse_var(
                "RECOVERY_LOOKBACK_HOURS",
                defaults.recovery_lookback_hours,
            )?,
            recovery_batch_size: parse_var("RECOVERY_BATCH_SIZE", defaults.recovery_batch_size)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.treasury.owner_id.trim().is_empty() || self.treasury.account_number.trim().is_empty() {
            return Err(ConfigError::Message(
                "treasury owner id and account number must be set".to_string(),
            ));
        }
        // rust_decimal carries at most 28 fractional digits
        if self.currency_scale > 28 {
            return Err(ConfigError::Message(format!(
                "CURRENCY_SCALE {} is out of range",
                self.currency_scale
            )));
        }
        if self.recovery_batch_size == 0 {
            return Err(ConfigError::Message(
                "RECOVERY_BATCH_SIZE must be greater than zero".to_string(),
            ));
        }
        if self.lock_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "LOCK_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Message(format!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(default),
    }
}
