// Settlement: atomic payer -> treasury transfers and their post-commit recovery
pub mod engine;
pub mod recovery;
pub mod scheduler;

pub use engine::{
    Basket, ChargeReceipt, Fulfillment, LockOrder, LockSequence, SettlementConfig,
    SettlementEngine, SettlementOutcome,
};
pub use recovery::{RecoveryConfig, RecoveryReport, SettlementRecovery};
pub use scheduler::{RecoveryScheduleConfig, RecoveryScheduler};
