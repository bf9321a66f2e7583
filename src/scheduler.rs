use crate::config::SchedulerConfig;
use crate::db::Destination;
use crate::error::Result;
use crate::program::WqpProgram;
use tokio::sync::watch;
use tokio::time::{interval, Duration};
use tracing::{error, info};

/// Runs the update on a fixed interval until shutdown is signalled.
pub struct Scheduler<D: Destination> {
    program: WqpProgram<D>,
    initial_delay: Duration,
    poll_interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl<D: Destination> Scheduler<D> {
    pub fn new(
        program: WqpProgram<D>,
        config: &SchedulerConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            program,
            initial_delay: Duration::from_secs(config.initial_delay_seconds),
            poll_interval: Duration::from_secs(config.interval_minutes * 60),
            shutdown_rx,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Scheduler starting with {}s initial delay, {}m interval",
            self.initial_delay.as_secs(),
            self.poll_interval.as_secs() / 60
        );

        tokio::select! {
            _ = tokio::time::sleep(self.initial_delay) => {},
            _ = self.shutdown_rx.changed() => {
                info!("Shutdown received during initial delay");
                return Ok(());
            }
        }

        self.run_update().await;

        let mut ticker = interval(self.poll_interval);
        ticker.tick().await; // first tick is immediate

        loop {
            tokio::select! {
                _ = ticker.tick() => self.run_update().await,
                _ = self.shutdown_rx.changed() => {
                    info!("Shutdown signal received, stopping scheduler");
                    break;
                }
            }
        }

        Ok(())
    }

    /// A failed update is logged and retried on the next tick.
    async fn run_update(&mut self) {
        info!("Starting update run");
        match self.program.update().await {
            Ok(()) => info!("Update run completed"),
            Err(e) => error!("Update error: {}", e),
        }
    }
}
