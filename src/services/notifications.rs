//! Очередь уведомлений.
//!
//! Обработчики запросов только кладут задачу в канал и сразу отвечают клиенту.
//! Фоновый воркер доставляет задачи по одной: до `max_attempts` попыток с
//! экспоненциальной паузой, после чего задача уходит в dead letters.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::NotificationConfig;
use crate::models::NewNotification;
use crate::store::Store;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &NewNotification) -> anyhow::Result<()>;
}

/// Доставка = запись в хранилище.
pub struct StoreSink(pub Arc<dyn Store>);

#[async_trait]
impl NotificationSink for StoreSink {
    async fn deliver(&self, notification: &NewNotification) -> anyhow::Result<()> {
        self.0.insert_notification(notification.clone()).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub notification: NewNotification,
    pub attempts: u32,
    pub last_error: String,
}

#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_attempts: u32,
    base_backoff: Duration,
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<NewNotification>,
    dead_letters: Arc<Mutex<Vec<DeadLetter>>>,
}

impl NotificationDispatcher {
    /// Запускает воркер. Должен вызываться внутри tokio runtime.
    pub fn spawn(sink: Arc<dyn NotificationSink>, config: &NotificationConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let dead_letters = Arc::new(Mutex::new(Vec::new()));
        let policy = RetryPolicy {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
        };

        tokio::spawn(run_worker(rx, sink, policy, dead_letters.clone()));

        Self { tx, dead_letters }
    }

    /// Ставит уведомление в очередь. Ошибки вызывающему не возвращаются.
    pub fn notify(&self, user_id: Uuid, message: impl Into<String>, event_id: Option<Uuid>) {
        let job = NewNotification {
            user_id,
            message: message.into(),
            event_id,
        };
        if self.tx.send(job).is_err() {
            error!(%user_id, "Notification worker is gone, notification dropped");
        }
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<NewNotification>,
    sink: Arc<dyn NotificationSink>,
    policy: RetryPolicy,
    dead_letters: Arc<Mutex<Vec<DeadLetter>>>,
) {
    while let Some(job) = rx.recv().await {
        if let Some(dead) = deliver_with_retry(sink.as_ref(), job, policy).await {
            error!(
                user_id = %dead.notification.user_id,
                attempts = dead.attempts,
                error = %dead.last_error,
                "Notification moved to dead letters"
            );
            dead_letters
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(dead);
        }
    }
    debug!("Notification worker stopped");
}

async fn deliver_with_retry(
    sink: &dyn NotificationSink,
    job: NewNotification,
    policy: RetryPolicy,
) -> Option<DeadLetter> {
    let mut attempt = 1;
    loop {
        match sink.deliver(&job).await {
            Ok(()) => {
                debug!(user_id = %job.user_id, attempt, "Notification delivered");
                return None;
            }
            Err(e) if attempt >= policy.max_attempts => {
                return Some(DeadLetter {
                    notification: job,
                    attempts: attempt,
                    last_error: e.to_string(),
                });
            }
            Err(e) => {
                let pause = policy.backoff(attempt);
                warn!(user_id = %job.user_id, attempt, error = %e, ?pause, "Notification delivery failed, retrying");
                sleep(pause).await;
                attempt += 1;
            }
        }
    }
}
