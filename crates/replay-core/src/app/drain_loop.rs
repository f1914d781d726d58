//! DrainLoop - 接続状態に追従するバックグラウンド drain
//!
//! # 設計
//! - shutdown は watch channel で伝え、実行中の pass は最後まで走らせる
//! - `max_inline_wait` を超える backoff は pass の外 (このループ) で sleep する

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::queue::OfflineQueue;

/// Background drain driven by connectivity.
/// - drains whenever `online` flips to `true`
/// - while online, drains again on enqueue, when the last pass reported a
///   backoff due time, and when work is rescheduled from outside the loop
///   (`retry_failed`, a manual `process_queue`)
/// - dropping the handle's sender (or `shutdown_and_join`) stops the loop
pub struct DrainLoop {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl DrainLoop {
    pub fn spawn(queue: Arc<OfflineQueue>, online: watch::Receiver<bool>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(drain_loop(queue, online, shutdown_rx));
        Self { shutdown_tx, join }
    }

    /// Stop after the current pass. An in-flight engine call is not cancelled.
    pub fn request_shutdown(&self) {
        // receiver may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        if let Err(error) = self.join.await {
            tracing::error!(%error, "drain loop task failed");
        }
    }
}

async fn drain_loop(
    queue: Arc<OfflineQueue>,
    mut online: watch::Receiver<bool>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        if !*online.borrow_and_update() {
            tracing::debug!("offline, waiting for connectivity");
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = online.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            continue;
        }

        let summary = queue.drain().await;
        let next_retry_in = summary.next_retry_in;

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = online.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = queue.wait_for_enqueue() => {}
            _ = queue.wait_for_reschedule() => {}
            _ = tokio::time::sleep(next_retry_in.unwrap_or_default()), if next_retry_in.is_some() => {}
        }
    }
    tracing::debug!("drain loop stopped");
}
