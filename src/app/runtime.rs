use super::{CctvOrchestrator, ShutdownReason};
use crate::error::{CctvError, Result};
use crate::pipeline::PipelineStatsSnapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info};

impl CctvOrchestrator {
    /// Run until SIGINT/SIGTERM, then shut down gracefully
    pub async fn run(&mut self) -> Result<i32> {
        info!("CCTV filter is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| CctvError::system("Shutdown sender already taken"))?;

        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| CctvError::system("Shutdown receiver already taken"))?;

        self.setup_signal_handlers(shutdown_sender);

        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| CctvError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {:?}", shutdown_reason);

        let exit_code = self.shutdown().await?;

        info!("CCTV filter shutdown complete");
        Ok(exit_code)
    }

    /// Process the existing backlog without watching, then stop
    pub async fn run_once(&mut self) -> Result<PipelineStatsSnapshot> {
        let queued = self.enqueue_backlog()?;
        info!("Processing {} backlog videos", queued);

        // A closed queue lets the consumer drain it and exit
        self.queue.close();
        self.start_consumer().await?;
        self.stop_consumer(Duration::MAX).await?;

        let stats = self.stats();
        info!("{:?}: {}", ShutdownReason::BacklogDrained, stats);
        Ok(stats)
    }

    fn setup_signal_handlers(&self, shutdown_sender: oneshot::Sender<ShutdownReason>) {
        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));

        // Handle SIGTERM (docker stop / systemd stop) - Unix only
        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate())
                {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        error!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if let Some(()) = sigterm.recv().await {
                    info!("Received SIGTERM signal");
                    if let Some(sender) = shutdown_sender_sigterm.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let shutdown_sender_sigint = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received SIGINT signal (Ctrl+C)");
                    if let Some(sender) = shutdown_sender_sigint.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                    }
                }
                Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
            }
        });
    }
}
