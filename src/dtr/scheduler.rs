use metrics::counter;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::model::{Actor, EntryPayload, MonthlyRecord};
use super::store::{DtrStore, StoreError};

/// Default quiet period before pending edits are written.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

/// Decides whether a failed auto-save write is attempted again.
pub trait RetryPolicy: Send + Sync + fmt::Debug {
    /// Delay before the next attempt, or `None` to give up. `attempt` counts
    /// the attempts made so far, starting at 1.
    fn next_delay(&self, attempt: u32, error: &StoreError) -> Option<Duration>;
}

/// Give up after the first failure. The user keeps their local edits and the
/// next edit to the day writes it again.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn next_delay(&self, _attempt: u32, _error: &StoreError) -> Option<Duration> {
        None
    }
}

/// Retry transient failures with doubling delays.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32, error: &StoreError) -> Option<Duration> {
        if attempt >= self.max_attempts || !error.is_transient() {
            return None;
        }

        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        Some(self.initial_delay.saturating_mul(factor).min(self.max_delay))
    }
}

#[derive(Debug, Clone)]
pub struct AutoSaveConfig {
    pub debounce: Duration,
    pub retry: Arc<dyn RetryPolicy>,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            retry: Arc::new(NoRetry),
        }
    }
}

/// Restartable one-shot timer.
#[derive(Default)]
pub struct Debouncer {
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    /// Run `task` once `delay` passes without another call to `schedule`.
    ///
    /// `task` is spawned on its own once the timer fires, so a later
    /// `schedule` or `cancel` only ever aborts the waiting, never the task.
    pub async fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut timer = self.timer.lock().await;
        if let Some(previous) = timer.take() {
            previous.abort();
        }

        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(task);
        }));
    }

    pub async fn cancel(&self) {
        if let Some(previous) = self.timer.lock().await.take() {
            previous.abort();
        }
    }
}

/// Handles of writes that have been issued but may not have completed.
#[derive(Default)]
pub struct WriteTracker {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WriteTracker {
    pub async fn track(&self, handle: JoinHandle<()>) {
        let mut handles = self.handles.lock().await;
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Wait until every tracked write, including ones started meanwhile, is done.
    pub async fn wait_all(&self) {
        loop {
            let batch = std::mem::take(&mut *self.handles.lock().await);
            if batch.is_empty() {
                break;
            }
            for handle in batch {
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "Auto-save write task ended abnormally");
                }
            }
        }
    }
}

/// One full-entry write, retried as `retry` allows.
pub async fn save_with_retry(
    store: &dyn DtrStore,
    retry: &dyn RetryPolicy,
    actor: &Actor,
    record_id: i32,
    day: u32,
    payload: &EntryPayload,
) -> Result<MonthlyRecord, StoreError> {
    let mut attempt = 1;

    loop {
        match store.update_entry(actor, record_id, day, payload).await {
            Ok(record) => {
                counter!("dtr_autosave_writes_total", "outcome" => "ok").increment(1);
                return Ok(record);
            }
            Err(e) => match retry.next_delay(attempt, &e) {
                Some(delay) => {
                    counter!("dtr_autosave_writes_total", "outcome" => "retry").increment(1);
                    tracing::warn!(
                        error = %e,
                        record_id,
                        day,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Auto-save failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    counter!("dtr_autosave_writes_total", "outcome" => "error").increment(1);
                    return Err(e);
                }
            },
        }
    }
}
