use tracing::info;

use crate::config::TreasuryConfig;
use crate::error::{AppError, AppResult};
use crate::ledger::{models::Wallet, store::LedgerStore};

/// The reserved clearing account that receives all purchase proceeds
#[derive(Debug, Clone)]
pub struct TreasuryAccount {
    config: TreasuryConfig,
}

impl TreasuryAccount {
    pub fn new(config: TreasuryConfig) -> Self {
        Self { config }
    }

    pub fn owner_id(&self) -> &str {
        &self.config.owner_id
    }

    pub fn account_number(&self) -> &str {
        &self.config.account_number
    }

    /// Provision the treasury wallet if it does not exist yet. Safe to run on
    /// every start-up.
    pub async fn bootstrap(&self, store: &dyn LedgerStore) -> AppResult<Wallet> {
        let wallet = match store.get_wallet(self.owner_id()).await? {
            Some(existing) => existing,
            None => match store
                .insert_wallet(self.owner_id(), self.account_number(), None)
                .await?
            {
                Some(created) => {
                    info!("🏦 Treasury wallet {} provisioned", created.account_number);
                    created
                }
                // Lost a race with another instance, or the number belongs to someone else
                None => store.get_wallet(self.owner_id()).await?.ok_or_else(|| {
                    AppError::Config(format!(
                        "Treasury account number {} is already assigned to another wallet",
                        self.account_number()
                    ))
                })?,
            },
        };

        if wallet.account_number != self.account_number() {
            return Err(AppError::Config(format!(
                "Treasury {} has account number {}, configured {}",
                wallet.owner_id,
                wallet.account_number,
                self.account_number()
            )));
        }

        info!("✓ Treasury wallet ready: {} (balance {})", wallet.account_number, wallet.balance);
        Ok(wallet)
    }
}
