//! Снятие просроченных резервов покупки.
//!
//! Покупка сразу списывает место, а оплату клиент подтверждает позже через
//! `PUT /api/bookings/:id`. Если подтверждения нет дольше `ttl`, бронь и билет
//! удаляются, место возвращается событию.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::AppResult;
use crate::AppState;

pub struct PurchaseCleanup {
    state: Arc<AppState>,
    ttl: ChronoDuration,
}

impl PurchaseCleanup {
    pub fn new(state: Arc<AppState>) -> Self {
        let ttl = ChronoDuration::seconds(state.config.purchases.ttl_seconds);
        Self { state, ttl }
    }

    pub fn with_ttl(state: Arc<AppState>, ttl: ChronoDuration) -> Self {
        Self { state, ttl }
    }

    /// Один проход очистки; возвращает число освобожденных мест.
    pub async fn run_once(&self) -> AppResult<usize> {
        let cutoff = Utc::now() - self.ttl;
        let expired = self.state.store.expired_pending_purchases(cutoff).await?;
        if expired.is_empty() {
            return Ok(0);
        }

        info!("Found {} expired purchases to release", expired.len());

        let mut released = 0;
        for booking_id in expired {
            match self.state.store.release_purchase(booking_id).await {
                Ok(true) => {
                    released += 1;
                    info!(%booking_id, "Expired purchase released");
                }
                // Оплачена или удалена между выборкой и снятием
                Ok(false) => warn!(%booking_id, "Purchase was not released (status changed?)"),
                Err(e) => error!(%booking_id, error = %e, "Failed to release expired purchase"),
            }
        }

        if released > 0 {
            self.state.cache.invalidate_events().await;
        }
        Ok(released)
    }

    /// Фоновый цикл: проход раз в `interval`.
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if let Err(e) = self.run_once().await {
                    error!(error = %e, "Purchase cleanup failed");
                }
                tokio::time::sleep(interval).await;
            }
        })
    }
}
