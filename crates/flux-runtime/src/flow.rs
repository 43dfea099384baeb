//! Flow: one producer task and one consumer task cooperating over a
//! bounded queue, with cancellation and incremental-watermark handling.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use flux_core::errors::{CancellationError, FluxError, SinkError, SourceError};
use flux_core::home::{BatchSink, Home};
use flux_core::progress::{FlowOutcome, FlowSummary, ProgressCounter};
use flux_core::retry::{retry_with, RetryPolicy};
use flux_core::store::Store;
use flux_core::watermark::WatermarkTracker;
use flux_domain::{generate_run_id_triple, FlowConfig, JournalStatus, RecordBatch, RunType};
use flux_persistence::Journal;

/// Channel-backed `BatchSink`: enqueues are the sole backpressure
/// mechanism — a full queue blocks the producer.
struct ChannelSink {
    tx: mpsc::Sender<RecordBatch>,
    tracker: Arc<Mutex<WatermarkTracker>>,
    progress: Arc<ProgressCounter>,
    watermark_configured: bool,
    schema_validated: bool,
}

#[async_trait]
impl BatchSink for ChannelSink {
    async fn accept(&mut self, batch: RecordBatch) -> Result<(), SourceError> {
        if self.watermark_configured && !self.schema_validated {
            self.tracker.lock().await.validate_schema(batch.schema()).map_err(|e| SourceError::Schema(e.to_string()))?;
            self.schema_validated = true;
        }
        self.tracker.lock().await.update(&batch);
        self.progress.record_read(batch.row_count() as u64);
        self.tx.send(batch).await.map_err(|_| SourceError::Io("consumer closed the queue".to_string()))
    }
}

pub struct Flow<H: Home + ?Sized + 'static, S: Store + 'static> {
    pub config: FlowConfig,
    pub coordinator_name: String,
    home: Arc<H>,
    store: S,
    journal: Arc<dyn Journal>,
    progress: Arc<ProgressCounter>,
}

impl<H: Home + ?Sized + 'static, S: Store + 'static> Flow<H, S> {
    pub fn new(config: FlowConfig, coordinator_name: impl Into<String>, home: Arc<H>, store: S, journal: Arc<dyn Journal>) -> Self {
        Self { config, coordinator_name: coordinator_name.into(), home, store, journal, progress: Arc::new(ProgressCounter::new()) }
    }

    pub async fn run(mut self) -> FlowSummary {
        let start = Instant::now();
        let started_at = Utc::now();
        let entity_name = self.config.entity_name.clone();
        let (coordinator_run_id, flow_run_id, entity_run_id) = generate_run_id_triple(
            &self.coordinator_name,
            &self.config.name,
            entity_name.as_deref().unwrap_or(""),
            &started_at.to_rfc3339(),
        );
        let run_ids = flux_domain::RunIdTriple { coordinator_run_id, flow_run_id, entity_run_id };

        let entry = match self
            .journal
            .begin_run(run_ids, &self.config.name, entity_name.clone(), self.config.run_type)
            .await
        {
            Ok(entry) => entry,
            Err(e) => return self.failed_summary(start, format!("journal begin_run failed: {e}")),
        };

        let result = self.run_inner().await;

        let (status, watermark, row_count, error) = match &result {
            Ok((watermark, rows)) => (JournalStatus::Ok, watermark.clone(), *rows, None),
            Err(e) => (JournalStatus::Failed, None, 0, Some(e.to_string())),
        };

        if let Err(e) = self.journal.complete_run(&entry, status, watermark, row_count, error.clone()).await {
            warn!("journal complete_run failed: {e}");
        }

        match result {
            Ok((_, rows)) => FlowSummary {
                name: self.config.name.clone(),
                status: FlowOutcome::Succeeded,
                row_count: rows,
                duration_ms: start.elapsed().as_millis() as u64,
                error: None,
            },
            Err(e) => self.failed_summary(start, e.to_string()),
        }
    }

    fn failed_summary(&self, start: Instant, error: String) -> FlowSummary {
        FlowSummary {
            name: self.config.name.clone(),
            status: FlowOutcome::Failed,
            row_count: 0,
            duration_ms: start.elapsed().as_millis() as u64,
            error: Some(error),
        }
    }

    async fn run_inner(&mut self) -> Result<(Option<String>, u64), FluxError> {
        self.config.validate().map_err(|e| FluxError::Config(flux_core::errors::ConfigError::Invalid(e.to_string())))?;

        let prior_watermark = self
            .journal
            .last_successful_watermark(&self.config.name, self.config.entity_name.as_deref())
            .await
            .unwrap_or(None);

        let tracker = Arc::new(Mutex::new(
            self.config
                .watermark_config
                .clone()
                .map(WatermarkTracker::new)
                .unwrap_or_else(|| WatermarkTracker::new(flux_domain::WatermarkConfig::new("__none__"))),
        ));

        self.store
            .configure_for_run(self.config.run_type)
            .await
            .map_err(FluxError::Config)?;
        self.store.before_flow_start().await.map_err(FluxError::Sink)?;

        let (tx, rx) = mpsc::channel::<RecordBatch>(self.config.queue_size);
        let home = Arc::clone(&self.home);
        let progress = Arc::clone(&self.progress);
        let tracker_for_producer = Arc::clone(&tracker);
        let run_incremental = matches!(self.config.run_type, RunType::Incremental) && prior_watermark.is_some();
        let watermark_configured = self.config.watermark_config.is_some();

        let producer = tokio::spawn(async move {
            let mut sink =
                ChannelSink { tx, tracker: tracker_for_producer, progress, watermark_configured, schema_validated: false };
            if run_incremental {
                home.read_with_watermark(prior_watermark.as_deref().unwrap(), &mut sink).await
            } else {
                home.read(&mut sink).await
            }
        });

        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let policy = RetryPolicy::new(format!("store_write:{}", self.config.name)).with_timeout(timeout);
        let consumer_result = drain_and_write(&mut self.store, &self.progress, &policy, rx).await;
        let producer_result = producer.await;

        match (producer_result, consumer_result) {
            (Ok(Ok(())), Ok(rows)) => {
                self.store.finish().await.map_err(FluxError::Sink)?;
                let watermark = tracker.lock().await.serialize();
                Ok((watermark, rows))
            }
            (Ok(Err(source_err)), consumer_outcome) => {
                self.cancel_cleanup(consumer_outcome.is_err()).await;
                Err(FluxError::Source(source_err))
            }
            (Err(join_err), _) => {
                self.cancel_cleanup(true).await;
                Err(FluxError::Cancellation(CancellationError(join_err.to_string())))
            }
            (Ok(Ok(())), Err(sink_err)) => {
                self.cancel_cleanup(true).await;
                Err(sink_err)
            }
        }
    }

    async fn cancel_cleanup(&mut self, cancel_producer_side: bool) {
        if cancel_producer_side {
            info!(flow = %self.config.name, "cancelling flow: draining queue and releasing resources");
        }
        if let Err(e) = self.store.close().await {
            error!(flow = %self.config.name, "store close failed during cancellation: {e}");
        }
    }
}

/// Dequeues until the producer closes the channel, writing each batch
/// under the retry wrapper. A free function (rather than a `&mut self`
/// method) so the retry closure can reborrow `store` each attempt
/// without fighting the borrow checker over a long-lived `&mut self`.
async fn drain_and_write<S: Store>(
    store: &mut S,
    progress: &ProgressCounter,
    policy: &RetryPolicy,
    mut rx: mpsc::Receiver<RecordBatch>,
) -> Result<u64, FluxError> {
    let mut total_rows = 0u64;
    let store = std::cell::RefCell::new(store);

    while let Some(batch) = rx.recv().await {
        let rows = batch.row_count() as u64;
        let pending = std::cell::RefCell::new(Some(batch));
        let mut reset_hook = || store.borrow_mut().reset_retry_sensitive_state();
        retry_with(
            policy,
            || {
                let taken = pending.borrow_mut().take();
                async {
                    match taken {
                        Some(b) => store.borrow_mut().write(b).await.map_err(FluxError::Sink),
                        None => Ok(()),
                    }
                }
            },
            None,
            Some(&mut reset_hook),
        )
        .await?;
        progress.record_written(rows);
        total_rows += rows;
    }
    Ok(total_rows)
}
