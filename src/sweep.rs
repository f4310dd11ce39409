use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use chanmint_registry::ChannelRegistry;

/// Periodically evict expired channels until `shutdown` flips to `true` or its sender is dropped.
pub fn spawn_sweeper(
    registry: Arc<ChannelRegistry>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = registry.sweep_expired();
                    debug!(removed, remaining = registry.len(), "sweep finished");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("channel sweeper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanmint_registry::ChannelNameGenerator;
    use chrono::Utc;

    #[tokio::test]
    async fn test_sweeper_evicts_expired_channels() {
        let registry = Arc::new(ChannelRegistry::new(
            3600,
            ChannelNameGenerator::new("channel_", 1, 9),
        ));
        registry.mint_channel_with_time(Some(1), Utc::now().timestamp() - 10);
        assert_eq!(registry.len(), 1);

        let (tx, rx) = watch::channel(false);
        let handle = spawn_sweeper(Arc::clone(&registry), Duration::from_millis(10), rx);

        for _ in 0..100 {
            if registry.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(registry.is_empty());

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_sweeper_stops_when_sender_dropped() {
        let registry = Arc::new(ChannelRegistry::default());
        let (tx, rx) = watch::channel(false);
        let handle = spawn_sweeper(registry, Duration::from_secs(3600), rx);

        drop(tx);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sweeper should stop")
            .unwrap();
    }
}
