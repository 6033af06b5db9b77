// Recovery scheduler - periodically sweeps for interrupted settlements
//
// Runs on a fixed interval. The first tick fires immediately so settlements
// interrupted by the previous shutdown are picked up at start-up.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

use super::recovery::SettlementRecovery;

#[derive(Debug, Clone)]
pub struct RecoveryScheduleConfig {
    pub interval: Duration,
}

pub struct RecoveryScheduler {
    config: RecoveryScheduleConfig,
    recovery: Arc<SettlementRecovery>,
}

impl RecoveryScheduler {
    pub fn new(config: RecoveryScheduleConfig, recovery: Arc<SettlementRecovery>) -> Self {
        Self { config, recovery }
    }

    /// Start the scheduler (runs in background)
    pub fn start(&self) -> JoinHandle<()> {
        let config = self.config.clone();
        let recovery = self.recovery.clone();

        tokio::spawn(async move { Self::run_interval_scheduler(&config, &recovery).await })
    }

    async fn run_interval_scheduler(config: &RecoveryScheduleConfig, recovery: &SettlementRecovery) {
        info!("⏰ Settlement recovery every {}s", config.interval.as_secs());

        let mut ticker = interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if let Err(e) = recovery.sweep().await {
                error!("❌ Settlement recovery sweep failed: {:?}", e);
            }
        }
    }
}
