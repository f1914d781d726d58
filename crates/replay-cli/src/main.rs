use async_trait::async_trait;
use serde::Deserialize;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::watch;
use tokio::time::{Duration, Instant, sleep};
use tracing_subscriber::EnvFilter;

use replay_core::app::{DrainLoop, OfflineQueueBuilder, QueueConfig};
use replay_core::domain::{ItemDraft, MutationIntent, SyncError};
use replay_core::impls::FileKvStore;
use replay_core::ports::SyncEngine;

/// The bits of a payload this demo engine cares about.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemRef {
    item_id: Option<String>,
    item: Option<ItemName>,
}

#[derive(Debug, Deserialize)]
struct ItemName {
    name: String,
}

/// In-process stand-in for the sync backend: the first few calls hit a
/// "network error", items named "forbidden" are rejected like a 403.
struct FlakyEngine {
    remaining_failures: AtomicU32,
}

impl FlakyEngine {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }

    fn apply(&self, op: &str, payload: &serde_json::Value) -> Result<(), SyncError> {
        let item: ItemRef = serde_json::from_value(payload.clone())
            .map_err(|e| SyncError::Validation(format!("json decode: {e}")))?;

        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(SyncError::Network(format!(
                "intentional failure (left={left})"
            )));
        }

        if item.item.as_ref().is_some_and(|i| i.name == "forbidden") {
            return Err(SyncError::from_status(403, "list is read-only"));
        }

        let target = item
            .item_id
            .or(item.item.map(|i| i.name))
            .unwrap_or_default();
        println!("  engine: {op} {target}");
        Ok(())
    }
}

#[async_trait]
impl SyncEngine for FlakyEngine {
    async fn create(&self, payload: &serde_json::Value) -> Result<(), SyncError> {
        self.apply("create", payload)
    }

    async fn update(&self, payload: &serde_json::Value) -> Result<(), SyncError> {
        self.apply("update", payload)
    }

    async fn delete(&self, payload: &serde_json::Value) -> Result<(), SyncError> {
        self.apply("delete", payload)
    }
}

fn init_tracing() {
    let default_level = "info";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// `replay-cli [config.json] [state-dir]`
fn load_config(path: Option<&str>) -> Result<QueueConfig, Box<dyn Error>> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            Ok(QueueConfig::from_json_str(&json)?)
        }
        None => Ok(QueueConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let config = load_config(args.next().as_deref())?;
    let state_dir = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("replay-cli-state"));

    // (A) queue over a file-backed store; anything left from a previous run is reloaded
    let storage = Arc::new(FileKvStore::open(&state_dir)?);
    let queue = Arc::new(
        OfflineQueueBuilder::new()
            .config(config)
            .storage(storage)
            .sync_engine(Arc::new(FlakyEngine::new(2)))
            .build()?,
    );
    println!(
        "state dir: {} (reloaded {} mutations)",
        state_dir.display(),
        queue.get_status().await.total
    );

    let _succeeded = queue.notifier().on_mutation_success(|m| {
        println!("  synced: {} {}", m.mutation_type, m.id);
    });
    let _failed = queue.notifier().on_mutation_failed(|f| {
        let verdict = if f.permanent { "gave up" } else { "will retry" };
        println!(
            "  failed: {} {} attempt={} ({verdict}): {}",
            f.mutation.mutation_type, f.mutation.id, f.mutation.retry_count, f.error
        );
    });

    // (B) offline session: intents pile up in the queue
    let intents = [
        MutationIntent::Add {
            list_id: "weekly".into(),
            item: ItemDraft::new("milk").with_quantity(2.0, "l"),
        },
        MutationIntent::Add {
            list_id: "weekly".into(),
            item: ItemDraft::new("eggs").with_category("dairy"),
        },
        MutationIntent::MarkGotten {
            item_id: "item-bread".into(),
            gotten: true,
        },
        MutationIntent::Update {
            item_id: "item-apples".into(),
            list_id: Some("weekly".into()),
            changes: serde_json::json!({ "quantity": 6 }),
        },
        MutationIntent::Delete {
            item_id: "item-old-coupon".into(),
        },
        MutationIntent::Add {
            list_id: "weekly".into(),
            item: ItemDraft::new("forbidden"),
        },
    ];
    for intent in intents {
        let id = queue.record(intent).await?;
        println!("queued while offline: {id}");
    }
    println!("status: {:?}", queue.get_status().await);

    // (C) drain loop waits for connectivity
    let (online_tx, online_rx) = watch::channel(false);
    let drain = DrainLoop::spawn(queue.clone(), online_rx);
    sleep(Duration::from_millis(200)).await;

    tracing::info!("connectivity restored");
    online_tx.send(true)?;

    // (D) poll until nothing is left to retry
    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        let status = queue.get_status().await;
        if status.pending == 0 && status.processing == 0 {
            break;
        }
        if Instant::now() >= deadline {
            println!("gave up waiting; {} still pending", status.pending);
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }

    for m in queue.get_queued_mutations().await {
        println!(
            "left in queue: {} {} status={} retries={} last_error={:?}",
            m.mutation_type, m.id, m.status, m.retry_count, m.last_error
        );
    }
    println!("final status: {:?}", queue.get_status().await);

    drain.shutdown_and_join().await;
    Ok(())
}
