use crate::pipeline::VideoProcessor;
use crate::queue::IngestionQueue;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Pop and process entries one at a time until cancelled or the queue is closed and drained.
///
/// Cancellation is checked between videos, so the one in flight always completes.
pub(super) fn consume(
    queue: &IngestionQueue,
    processor: &VideoProcessor,
    token: &CancellationToken,
    idle_wait: Duration,
) {
    loop {
        if token.is_cancelled() {
            if !queue.is_empty() {
                info!(
                    "Stopping with {} queued videos left for the next startup scan",
                    queue.len()
                );
            }
            break;
        }

        match queue.pop_timeout(idle_wait) {
            Some(entry) => {
                processor.process(&entry);
            }
            None if queue.is_closed() => break,
            None => {}
        }
    }
    debug!("Consumer loop finished");
}

pub(super) fn spawn_consumer(
    queue: Arc<IngestionQueue>,
    processor: Arc<VideoProcessor>,
    token: CancellationToken,
    idle_wait: Duration,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("cctv-consumer".to_string())
        .spawn(move || consume(&queue, &processor, &token, idle_wait))
}
