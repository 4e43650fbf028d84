// Minimum spacing between requests to one backend

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum interval between consecutive requests.
///
/// Shared by every session using the backend that owns it; the lock is held
/// across the sleep so callers are admitted one at a time.
#[derive(Debug)]
pub struct RequestSpacer {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestSpacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Wait until the next request may be sent, then claim the slot.
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let pause = self.min_interval - elapsed;
                tracing::debug!("Sleeping {:?} to respect request spacing", pause);
                tokio::time::sleep(pause).await;
            }
        }
        *last = Some(Instant::now());
    }
}
