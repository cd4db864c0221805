pub mod config;
pub mod database;
pub mod redis_client;
pub mod models;
pub mod controllers;
pub mod middleware;
pub mod cache;
pub mod services;
pub mod store;
pub mod error;
pub mod validation;

use axum::{
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use config::{Config, StorageBackend};
use services::auth::{PasswordHasher, TokenService};
use services::cleanup::PurchaseCleanup;
use services::notifications::{NotificationDispatcher, StoreSink};
use services::otp::{MemoryOtpStore, OtpStore, PasswordResetService, RedisOtpStore};
use services::{mailer::Mailer, payment::PaymentGateway};
use store::{MemoryStore, PgStore, Store};

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub cache: cache::CacheService,
    pub tokens: TokenService,
    pub passwords: PasswordHasher,
    pub payments: Arc<dyn PaymentGateway>,
    pub notifier: NotificationDispatcher,
    pub password_reset: PasswordResetService,
}

/// Внешние зависимости состояния. В тестах подменяются in-memory реализациями.
pub struct Backends {
    pub store: Arc<dyn Store>,
    pub redis: Option<redis_client::RedisClient>,
    pub payments: Arc<dyn PaymentGateway>,
    pub otp_store: Arc<dyn OtpStore>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let store: Arc<dyn Store> = match config.database.backend {
            StorageBackend::Postgres => {
                let db = database::Database::connect(&config.database).await?;
                db.run_migrations().await?;
                Arc::new(PgStore::new(db))
            }
            StorageBackend::Memory => {
                info!("Using in-memory storage");
                Arc::new(MemoryStore::new())
            }
        };

        let redis = redis_client::RedisClient::connect_optional(config.redis.url.as_deref()).await?;
        let otp_store: Arc<dyn OtpStore> = match &redis {
            Some(redis) => Arc::new(RedisOtpStore::new(redis.clone())),
            None => Arc::new(MemoryOtpStore::new()),
        };
        let payments = services::payment::gateway_from_config(&config.payment, &config.circuit_breaker)?;
        let mailer = services::mailer::mailer_from_config(&config.email)?;

        let state = Self::assemble(
            config,
            Backends {
                store,
                redis,
                payments,
                otp_store,
                mailer,
            },
        );

        let state_for_bg = state.clone();
        task::spawn(async move {
            // Warmup cache в фоне
            state_for_bg.cache.warmup_cache().await;
        });

        let interval = Duration::from_secs(state.config.purchases.cleanup_interval_seconds);
        PurchaseCleanup::new(state.clone()).spawn(interval);

        Ok(state)
    }

    /// Собирает состояние из готовых зависимостей. Нужен рантайм tokio:
    /// воркер уведомлений запускается сразу.
    pub fn assemble(config: Config, backends: Backends) -> Arc<Self> {
        let cache = cache::CacheService::new(backends.redis, backends.store.clone());
        let notifier = NotificationDispatcher::spawn(
            Arc::new(StoreSink(backends.store.clone())),
            &config.notifications,
        );
        let password_reset =
            PasswordResetService::new(backends.otp_store, backends.mailer, config.otp.ttl_seconds);

        Arc::new(Self {
            tokens: TokenService::new(&config.jwt),
            passwords: PasswordHasher::new(config.jwt.bcrypt_cost),
            store: backends.store,
            cache,
            payments: backends.payments,
            notifier,
            password_reset,
            config,
        })
    }
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": format!("Not Found - {}", uri.path()) })),
    )
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Conference API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        // Mount the routes from the controllers module
        .nest("/api", controllers::routes())
        .fallback(not_found)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
