//! payment.rs
//!
//! Сервисный слой для работы с внешним платёжным шлюзом (Stripe payment intents).
//!
//! Ключевые компоненты:
//! 1.  **CircuitBreaker**: паттерн "Автоматический выключатель". После серии сбоев
//!     запросы к шлюзу временно блокируются, затем пропускается один пробный.
//! 2.  **PaymentGateway**: трейт, за которым спрятан конкретный шлюз. Контроллеры
//!     и сценарий покупки работают только с ним.
//! 3.  **StripeGateway**: реализация поверх `reqwest`; все сетевые вызовы идут через
//!     `CircuitBreaker`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tokio::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::{CircuitBreakerConfig, PaymentConfig};

/// Состояния "Автоматического выключателя" (Circuit Breaker).
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitState {
    /// Нормальный режим работы, запросы разрешены.
    Closed,
    /// Запросы временно запрещены после серии сбоев.
    Open,
    /// После таймаута в Open разрешается пробный запрос.
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: RwLock<CircuitState>,
    /// Счетчик последовательных сбоев.
    failure_count: AtomicU32,
    /// Момент последнего сбоя, мс от `started`.
    last_failure_ms: AtomicU64,
    started: Instant,
    failure_threshold: u32,
    timeout_duration: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, timeout: Duration) -> Self {
        Self {
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            last_failure_ms: AtomicU64::new(0),
            started: Instant::now(),
            failure_threshold,
            timeout_duration: timeout,
        }
    }

    pub fn from_config(config: &CircuitBreakerConfig) -> Self {
        Self::new(
            config.failure_threshold,
            Duration::from_secs(config.timeout_seconds),
        )
    }

    // Отравленная блокировка не должна ронять запросы к шлюзу
    fn read_state(&self) -> RwLockReadGuard<'_, CircuitState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CircuitState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Проверяет, можно ли выполнить следующий запрос к сервису.
    pub fn can_execute(&self) -> bool {
        let state = self.read_state();

        match *state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let since_failure =
                    self.elapsed_ms().saturating_sub(self.last_failure_ms.load(Ordering::Relaxed));

                if since_failure >= self.timeout_duration.as_millis() as u64 {
                    drop(state);
                    *self.write_state() = CircuitState::HalfOpen;
                    info!("Circuit breaker transitioning to HalfOpen state");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => true,
        }
    }

    pub fn record_success(&self) {
        let mut state = self.write_state();

        match *state {
            CircuitState::HalfOpen => {
                *state = CircuitState::Closed;
                self.failure_count.store(0, Ordering::Relaxed);
                info!("Circuit breaker recovered - transitioning to Closed state");
            }
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::Relaxed);
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let failure_count = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        self.last_failure_ms.store(self.elapsed_ms(), Ordering::Relaxed);

        let mut state = self.write_state();

        match *state {
            CircuitState::Closed => {
                if failure_count >= self.failure_threshold {
                    *state = CircuitState::Open;
                    error!(
                        "Circuit breaker OPENED - {} failures reached threshold {}",
                        failure_count, self.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen => {
                *state = CircuitState::Open;
                warn!("Circuit breaker test failed - returning to Open state");
            }
            CircuitState::Open => {}
        }
    }

    /// Текущее состояние для мониторинга.
    pub fn get_state(&self) -> CircuitState {
        self.read_state().clone()
    }
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Circuit breaker is open - payment gateway temporarily unavailable")]
    CircuitOpen,

    #[error("Payment gateway error: {0}")]
    Http(#[from] reqwest::Error),

    /// Шлюз ответил 4xx: запрос отклонен по данным.
    #[error("Payment gateway rejected the request: {0}")]
    Rejected(String),

    #[error("Payment gateway unavailable: HTTP {0}")]
    Unavailable(u16),

    #[error("Payment gateway is not configured")]
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// `amount` в минимальных единицах валюты (центы).
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<PaymentIntent, PaymentError>;
}

/// Переводит сумму в основных единицах в центы для шлюза.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

// --- Модели данных для API Stripe ---

#[derive(Debug, Serialize)]
struct PaymentIntentForm<'a> {
    amount: i64,
    currency: &'a str,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentResponse {
    id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

/// Клиент Stripe. Запросы form-encoded, авторизация по секретному ключу.
#[derive(Clone)]
pub struct StripeGateway {
    secret_key: String,
    base_url: String,
    http_client: reqwest::Client,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl StripeGateway {
    pub fn new(
        config: &PaymentConfig,
        secret_key: String,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, PaymentError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            secret_key,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            http_client,
            circuit_breaker,
        })
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.get_state()
    }

    async fn send(&self, amount: i64, currency: &str) -> Result<PaymentIntent, PaymentError> {
        let body = serde_urlencoded::to_string(PaymentIntentForm { amount, currency })
            .map_err(|e| PaymentError::Rejected(e.to_string()))?;

        let response = self
            .http_client
            .post(format!("{}/v1/payment_intents", self.base_url))
            .bearer_auth(&self.secret_key)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(PaymentError::Unavailable(status.as_u16()));
        }
        if status.is_success() {
            let intent: PaymentIntentResponse = response.json().await?;
            return Ok(PaymentIntent {
                id: intent.id,
                client_secret: intent.client_secret,
            });
        }

        let message = response
            .json::<StripeErrorBody>()
            .await
            .ok()
            .and_then(|b| b.error.message)
            .unwrap_or_else(|| status.to_string());
        Err(PaymentError::Rejected(message))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        if !self.circuit_breaker.can_execute() {
            warn!("Circuit breaker is OPEN - blocking payment gateway request");
            return Err(PaymentError::CircuitOpen);
        }

        match self.send(amount, currency).await {
            Ok(intent) => {
                self.circuit_breaker.record_success();
                info!(intent_id = %intent.id, amount, currency, "Payment intent created");
                Ok(intent)
            }
            // Отказ по данным запроса не говорит о недоступности шлюза
            Err(PaymentError::Rejected(message)) => {
                self.circuit_breaker.record_success();
                warn!(%message, "Payment intent rejected");
                Err(PaymentError::Rejected(message))
            }
            Err(e) => {
                error!("Payment gateway request failed: {:?}", e);
                self.circuit_breaker.record_failure();
                Err(e)
            }
        }
    }
}

/// Заглушка на случай, когда STRIPE_SECRET_KEY не задан.
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn create_payment_intent(
        &self,
        _amount: i64,
        _currency: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        Err(PaymentError::NotConfigured)
    }
}

/// Собирает шлюз по конфигу.
pub fn gateway_from_config(
    payment: &PaymentConfig,
    circuit_breaker: &CircuitBreakerConfig,
) -> Result<Arc<dyn PaymentGateway>, PaymentError> {
    match &payment.secret_key {
        Some(key) => {
            let breaker = Arc::new(CircuitBreaker::from_config(circuit_breaker));
            Ok(Arc::new(StripeGateway::new(payment, key.clone(), breaker)?))
        }
        None => {
            warn!("STRIPE_SECRET_KEY not set, payments are disabled");
            Ok(Arc::new(DisabledGateway))
        }
    }
}
