//! Batch queue with size- and debounce-triggered flushes.
//!
//! Records are buffered in arrival order. Reaching `batch_size` flushes at once;
//! otherwise every enqueue restarts a single debounce timer and the buffer flushes
//! when the timer elapses undisturbed. A flush drains the whole buffer synchronously
//! and hands the batch to a separate send task, so records enqueued while a send is in
//! flight start a fresh batch.
//!
//! Send tasks are chained: each waits for the previous one to finish, so batches reach
//! the transport in the order their flushes were triggered. Sends are never cancelled.
//! Failed sends are logged and dropped.
//!
//! All methods that may flush spawn tasks and must run inside a tokio runtime.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use arc_common::StagedRecord;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::transport::UploadTransport;

pub type Batch = Vec<StagedRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    pub batch_size: usize,
    pub debounce: Duration,
}

#[derive(Clone)]
pub struct BatchQueue {
    inner: Arc<Inner>,
}

struct Inner {
    settings: QueueSettings,
    transport: Arc<dyn UploadTransport>,
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    buffer: Vec<StagedRecord>,
    timer: Option<JoinHandle<()>>,
    /// Bumped whenever the timer slot changes; a firing timer with a stale
    /// generation has been superseded and does nothing.
    timer_generation: u64,
    in_flight: Vec<JoinHandle<()>>,
    /// Resolves when the most recently spawned send has finished.
    last_send: Option<oneshot::Receiver<()>>,
}

impl QueueState {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.timer_generation += 1;
    }

    fn take_batch(&mut self) -> Batch {
        self.cancel_timer();
        std::mem::take(&mut self.buffer)
    }

    fn spawn_send(&mut self, transport: Arc<dyn UploadTransport>, batch: Batch) {
        self.in_flight.retain(|handle| !handle.is_finished());
        let previous = self.last_send.take();
        let (done, finished) = oneshot::channel();
        self.last_send = Some(finished);
        self.in_flight.push(tokio::spawn(async move {
            if let Some(previous) = previous {
                // Err only means the previous task is gone; either way it is over.
                let _ = previous.await;
            }
            send_batch(transport, batch).await;
            let _ = done.send(());
        }));
    }
}

impl BatchQueue {
    pub fn new(settings: QueueSettings, transport: Arc<dyn UploadTransport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                transport,
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    pub fn settings(&self) -> QueueSettings {
        self.inner.settings
    }

    /// Append a record; flush immediately at `batch_size`, else (re)start the debounce timer.
    pub fn enqueue(&self, record: StagedRecord) {
        let mut state = self.lock();
        state.buffer.push(record);

        if state.buffer.len() >= self.inner.settings.batch_size {
            let batch = state.take_batch();
            debug!(count = batch.len(), "Batch size reached, flushing");
            state.spawn_send(self.inner.transport.clone(), batch);
            return;
        }

        state.cancel_timer();
        let generation = state.timer_generation;
        let debounce = self.inner.settings.debounce;
        let queue = self.clone();
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            queue.flush_from_timer(generation);
        }));
    }

    /// Drain the buffer into one batch and start sending it. Returns the number of
    /// records dispatched; an empty buffer makes no network call and returns 0.
    pub fn flush(&self) -> usize {
        let mut state = self.lock();
        let batch = state.take_batch();
        if batch.is_empty() {
            return 0;
        }
        let count = batch.len();
        state.spawn_send(self.inner.transport.clone(), batch);
        count
    }

    /// Like `flush`, but returns only once this batch and every batch triggered
    /// before it have been sent.
    pub async fn flush_now(&self) -> usize {
        let count = self.flush();
        self.settle().await;
        count
    }

    /// Wait for every send started so far (including ones started while waiting).
    /// A pending debounce timer is not forced.
    pub async fn settle(&self) {
        loop {
            let handles = std::mem::take(&mut self.lock().in_flight);
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Batch send task ended abnormally");
                }
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn has_pending_timer(&self) -> bool {
        self.lock().timer.is_some()
    }

    fn flush_from_timer(&self, generation: u64) {
        let mut state = self.lock();
        if state.timer_generation != generation {
            return;
        }
        // Our own handle: detach rather than abort.
        state.timer = None;
        let batch = state.take_batch();
        if batch.is_empty() {
            return;
        }
        debug!(count = batch.len(), "Debounce elapsed, flushing");
        state.spawn_send(self.inner.transport.clone(), batch);
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn send_batch(transport: Arc<dyn UploadTransport>, batch: Batch) {
    let count = batch.len();
    match transport.send(batch).await {
        Ok(receipt) if receipt.ok => {
            info!(count, status = receipt.status, "Batch uploaded");
        }
        Ok(receipt) => {
            warn!(
                count,
                status = receipt.status,
                body = ?receipt.body,
                "Backend rejected batch, records dropped"
            );
        }
        Err(e) => {
            warn!(error = %e, count, "Batch upload failed, records dropped");
        }
    }
}
