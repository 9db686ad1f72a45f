use super::orchestrator::{CONSUMER, WATCHER};
use super::{CctvOrchestrator, ComponentState};
use crate::error::{CctvError, Result};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

/// Upper bound for the in-flight video to finish
const CONSUMER_STOP_TIMEOUT: Duration = Duration::from_secs(300);

impl CctvOrchestrator {
    /// Stop the watcher, let the current video finish and release everything
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        let mut exit_code = 0;

        // No new events while the consumer winds down
        if let Err(e) = self.stop_watcher().await {
            error!("Error stopping watcher: {}", e);
            exit_code = 1;
        }

        self.cancellation_token.cancel();
        self.queue.close();

        if let Err(e) = self.stop_consumer(CONSUMER_STOP_TIMEOUT).await {
            error!("Error stopping consumer: {}", e);
            exit_code = 1;
        }

        info!("Pipeline totals: {}", self.stats());
        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    async fn stop_watcher(&mut self) -> Result<()> {
        info!("Stopping {} component", WATCHER);
        self.set_component_state(WATCHER, ComponentState::Stopping)
            .await;

        let result = match self.event_source.as_mut() {
            Some(source) => source.stop(),
            None => Ok(()),
        };

        match result {
            Ok(()) => {
                self.set_component_state(WATCHER, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", WATCHER);
                Ok(())
            }
            Err(e) => {
                self.set_component_state(WATCHER, ComponentState::Failed)
                    .await;
                Err(e)
            }
        }
    }

    /// Wait for the consumer thread to exit; callers cancel or close the queue first
    pub(super) async fn stop_consumer(&mut self, limit: Duration) -> Result<()> {
        let Some(handle) = self.consumer.take() else {
            self.set_component_state(CONSUMER, ComponentState::Stopped)
                .await;
            return Ok(());
        };

        info!("Stopping {} component", CONSUMER);
        self.set_component_state(CONSUMER, ComponentState::Stopping)
            .await;

        match timeout(limit, tokio::task::spawn_blocking(move || handle.join())).await {
            Ok(Ok(Ok(()))) => {
                self.set_component_state(CONSUMER, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", CONSUMER);
                Ok(())
            }
            Ok(Ok(Err(_))) | Ok(Err(_)) => {
                self.set_component_state(CONSUMER, ComponentState::Failed)
                    .await;
                Err(CctvError::component(CONSUMER, "consumer thread panicked"))
            }
            Err(_) => {
                self.set_component_state(CONSUMER, ComponentState::Failed)
                    .await;
                error!("{} component stop timeout", CONSUMER);
                Err(CctvError::System {
                    message: format!("{} component stop timeout", CONSUMER),
                })
            }
        }
    }
}
