use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval_at, Duration, Instant};
use tracing::info;

use crate::auth::KeyRegistry;

pub const DAILY: Duration = Duration::from_secs(24 * 60 * 60);

/// Periodically clears every key's usage counter.
///
/// Runs independently of request handling. An admit racing with a reset may
/// be counted on either side of it.
#[derive(Clone)]
pub struct ResetScheduler {
    registry: Arc<KeyRegistry>,
    period: Duration,
    stop_tx: Arc<Mutex<Option<mpsc::Sender<()>>>>,
}

impl ResetScheduler {
    pub fn new(registry: Arc<KeyRegistry>, period: Duration) -> Self {
        Self {
            registry,
            period,
            stop_tx: Arc::new(Mutex::new(None)),
        }
    }

    pub fn daily(registry: Arc<KeyRegistry>) -> Self {
        Self::new(registry, DAILY)
    }

    /// Starts the reset loop. The first reset fires one period from now.
    pub async fn start(&self) {
        let (tx, mut rx) = mpsc::channel(1);
        if let Some(previous) = self.stop_tx.lock().await.replace(tx) {
            let _ = previous.send(()).await;
        }

        let registry = Arc::clone(&self.registry);
        let period = self.period;

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        registry.reset_all();
                        info!("Daily API usage reset for {} keys", registry.len());
                    }
                    _ = rx.recv() => {
                        info!("Stopping usage reset scheduler");
                        break;
                    }
                }
            }
        });
    }

    pub async fn stop(&self) {
        if let Some(tx) = self.stop_tx.lock().await.take() {
            let _ = tx.send(()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ApiKeyRecord, Tier};

    fn setup_registry() -> Arc<KeyRegistry> {
        Arc::new(
            KeyRegistry::new(vec![ApiKeyRecord::new("test_key", Tier::free(), Some(2))]).unwrap(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_resets_after_each_period() {
        let registry = setup_registry();
        let scheduler = ResetScheduler::new(Arc::clone(&registry), Duration::from_secs(60));
        scheduler.start().await;

        registry.admit("test_key").unwrap();
        registry.admit("test_key").unwrap();
        assert!(registry.admit("test_key").is_err());

        // Not yet due
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(registry.admit("test_key").is_err());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(registry.validate(Some("test_key")).unwrap().used, 0);
        registry.admit("test_key").unwrap();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(registry.validate(Some("test_key")).unwrap().used, 0);

        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_resets() {
        let registry = setup_registry();
        let scheduler = ResetScheduler::new(Arc::clone(&registry), Duration::from_secs(60));
        scheduler.start().await;
        scheduler.stop().await;

        registry.admit("test_key").unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(registry.validate(Some("test_key")).unwrap().used, 1);
    }
}
