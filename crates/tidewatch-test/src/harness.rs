//! Async test helpers

use std::time::Duration;

use tidewatch_channel::Subscription;
use tokio::task::JoinHandle;

/// Let every runnable task make progress
///
/// Only yields; it never advances a paused clock.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// Read a subscription to the end on a background task
pub fn collect<T: Clone + Send + 'static>(mut subscription: Subscription<T>) -> JoinHandle<Vec<T>> {
    tokio::spawn(async move {
        let mut values = Vec::new();
        while let Some(value) = subscription.next().await {
            values.push(value);
        }
        values
    })
}

/// Like [`collect`], sleeping for `pause` after every value
pub fn collect_slowly<T: Clone + Send + 'static>(
    mut subscription: Subscription<T>,
    pause: Duration,
) -> JoinHandle<Vec<T>> {
    tokio::spawn(async move {
        let mut values = Vec::new();
        while let Some(value) = subscription.next().await {
            values.push(value);
            tokio::time::sleep(pause).await;
        }
        values
    })
}
