//! Сброс пароля по одноразовому коду.
//!
//! На каждого пользователя хранится своя запись: sha256 от кода, срок жизни и
//! флаг подтверждения. Новый запрос заменяет только запись этого пользователя.
//! Смена пароля возможна лишь по подтвержденной записи, после чего она удаляется.
//! После `MAX_OTP_ATTEMPTS` неверных кодов запись удаляется, нужен новый код.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use constant_time_eq::constant_time_eq;
use rand::Rng;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::redis_client::RedisClient;
use crate::services::mailer::Mailer;

pub const MAX_OTP_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetRecord {
    pub user_id: Uuid,
    pub digest: String,
    pub expires_at: DateTime<Utc>,
    pub verified: bool,
    /// Неверные попытки ввода кода.
    #[serde(default)]
    pub attempts: u32,
}

impl ResetRecord {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    fn ttl_seconds(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(1) as u64
    }
}

#[derive(Debug, Error)]
pub enum OtpStoreError {
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl From<OtpStoreError> for AppError {
    fn from(err: OtpStoreError) -> Self {
        AppError::Unexpected(format!("otp store: {}", err))
    }
}

#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn put(&self, record: ResetRecord, ttl_seconds: u64) -> Result<(), OtpStoreError>;
    async fn get(&self, user_id: Uuid) -> Result<Option<ResetRecord>, OtpStoreError>;
    async fn remove(&self, user_id: Uuid) -> Result<(), OtpStoreError>;
}

/// Записи в Redis под ключом `otp:{userId}`, истекают по TTL.
pub struct RedisOtpStore {
    redis: RedisClient,
}

impl RedisOtpStore {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }

    fn key(user_id: Uuid) -> String {
        format!("otp:{}", user_id)
    }
}

#[async_trait]
impl OtpStore for RedisOtpStore {
    async fn put(&self, record: ResetRecord, ttl_seconds: u64) -> Result<(), OtpStoreError> {
        let data = serde_json::to_string(&record)?;
        let mut conn = self.redis.conn.clone();
        let _: () = conn.set_ex(Self::key(record.user_id), data, ttl_seconds).await?;
        Ok(())
    }

    async fn get(&self, user_id: Uuid) -> Result<Option<ResetRecord>, OtpStoreError> {
        let mut conn = self.redis.conn.clone();
        let data: Option<String> = conn.get(Self::key(user_id)).await?;
        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn remove(&self, user_id: Uuid) -> Result<(), OtpStoreError> {
        let mut conn = self.redis.conn.clone();
        let _: () = conn.del(Self::key(user_id)).await?;
        Ok(())
    }
}

/// Для тестов и запуска без Redis. Просроченные записи отсекаются по `expires_at`.
#[derive(Default)]
pub struct MemoryOtpStore {
    records: Mutex<HashMap<Uuid, ResetRecord>>,
}

impl MemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
    async fn put(&self, record: ResetRecord, _ttl_seconds: u64) -> Result<(), OtpStoreError> {
        self.records.lock().await.insert(record.user_id, record);
        Ok(())
    }

    async fn get(&self, user_id: Uuid) -> Result<Option<ResetRecord>, OtpStoreError> {
        Ok(self.records.lock().await.get(&user_id).cloned())
    }

    async fn remove(&self, user_id: Uuid) -> Result<(), OtpStoreError> {
        self.records.lock().await.remove(&user_id);
        Ok(())
    }
}

fn digest(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Шестизначный код 100000..=999999.
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpDelivery {
    First,
    Resend,
}

#[derive(Clone)]
pub struct PasswordResetService {
    store: Arc<dyn OtpStore>,
    mailer: Arc<dyn Mailer>,
    ttl: Duration,
}

impl PasswordResetService {
    pub fn new(store: Arc<dyn OtpStore>, mailer: Arc<dyn Mailer>, ttl_seconds: i64) -> Self {
        Self {
            store,
            mailer,
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    /// Выпускает новый код для пользователя и отправляет его письмом.
    pub async fn send_code(&self, user: &User, delivery: OtpDelivery) -> AppResult<()> {
        let code = generate_code();
        let now = Utc::now();
        let record = ResetRecord {
            user_id: user.id,
            digest: digest(&code),
            expires_at: now + self.ttl,
            verified: false,
            attempts: 0,
        };
        let ttl = record.ttl_seconds(now);
        self.store.put(record, ttl).await?;

        let (body, failure) = match delivery {
            OtpDelivery::First => (
                format!("Your OTP for password reset is: {}", code),
                "Error sending OTP",
            ),
            OtpDelivery::Resend => (
                format!("Your new OTP for password reset is: {}", code),
                "Error resending OTP",
            ),
        };

        if let Err(e) = self
            .mailer
            .send(&user.email, "OTP for password reset", &body)
            .await
        {
            error!(user_id = %user.id, error = %e, "Failed to send OTP email");
            return Err(AppError::Upstream(failure.to_string()));
        }

        info!(user_id = %user.id, "OTP issued");
        Ok(())
    }

    pub async fn verify(&self, user: &User, code: &str) -> AppResult<()> {
        let now = Utc::now();
        let record = match self.store.get(user.id).await? {
            Some(record) if record.is_live(now) => record,
            _ => return Err(AppError::validation("Invalid OTP")),
        };

        let ttl = record.ttl_seconds(now);
        if !constant_time_eq(digest(code.trim()).as_bytes(), record.digest.as_bytes()) {
            let attempts = record.attempts + 1;
            if attempts >= MAX_OTP_ATTEMPTS {
                warn!(user_id = %user.id, attempts, "OTP attempts exhausted, record dropped");
                self.store.remove(user.id).await?;
            } else {
                self.store.put(ResetRecord { attempts, ..record }, ttl).await?;
            }
            return Err(AppError::validation("Invalid OTP"));
        }

        self.store
            .put(
                ResetRecord {
                    verified: true,
                    ..record
                },
                ttl,
            )
            .await?;
        Ok(())
    }

    /// Проверяет, что код подтвержден. Запись остается до `complete`.
    pub async fn ensure_verified(&self, user: &User) -> AppResult<()> {
        match self.store.get(user.id).await? {
            Some(record) if record.verified && record.is_live(Utc::now()) => Ok(()),
            _ => Err(AppError::validation("OTP verification required")),
        }
    }

    /// Гасит запись после того, как новый пароль сохранен.
    pub async fn complete(&self, user: &User) -> AppResult<()> {
        self.store.remove(user.id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::services::mailer::MailError;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct CapturingMailer {
        sent: StdMutex<Vec<(String, String)>>,
    }

    impl CapturingMailer {
        fn last_code_for(&self, email: &str) -> String {
            let sent = self.sent.lock().unwrap();
            let (_, body) = sent.iter().rev().find(|(to, _)| to == email).unwrap();
            body.rsplit(' ').next().unwrap().to_string()
        }
    }

    #[async_trait]
    impl Mailer for CapturingMailer {
        async fn send(&self, to: &str, _subject: &str, body: &str) -> Result<(), MailError> {
            self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
            Ok(())
        }
    }

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, to: &str, _subject: &str, _body: &str) -> Result<(), MailError> {
            Err(MailError::Address(to.to_string()))
        }
    }

    fn user(email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: "U".to_string(),
            email: email.to_string(),
            password_hash: String::new(),
            role: Role::Attendee,
            created_at: Utc::now(),
        }
    }

    fn service(mailer: Arc<dyn Mailer>, ttl: i64) -> PasswordResetService {
        PasswordResetService::new(Arc::new(MemoryOtpStore::new()), mailer, ttl)
    }

    #[test]
    fn codes_have_six_digits() {
        for _ in 0..100 {
            let code: u32 = generate_code().parse().unwrap();
            assert!((100_000..=999_999).contains(&code));
        }
    }

    #[tokio::test]
    async fn codes_are_scoped_per_user() {
        let mailer = Arc::new(CapturingMailer::default());
        let service = service(mailer.clone(), 600);
        let x = user("x@example.com");
        let y = user("y@example.com");

        service.send_code(&x, OtpDelivery::First).await.unwrap();
        let x_code = mailer.last_code_for("x@example.com");
        service.send_code(&y, OtpDelivery::First).await.unwrap();
        let y_code = mailer.last_code_for("y@example.com");

        // Запрос Y не затирает код X, но код X не подходит для Y
        if x_code != y_code {
            assert!(service.verify(&y, &x_code).await.is_err());
        }
        service.verify(&x, &x_code).await.unwrap();
        service.verify(&y, &y_code).await.unwrap();
    }

    #[tokio::test]
    async fn resend_replaces_previous_code() {
        let mailer = Arc::new(CapturingMailer::default());
        let service = service(mailer.clone(), 600);
        let x = user("x@example.com");

        service.send_code(&x, OtpDelivery::First).await.unwrap();
        let first = mailer.last_code_for("x@example.com");
        service.send_code(&x, OtpDelivery::Resend).await.unwrap();
        let second = mailer.last_code_for("x@example.com");

        if first != second {
            assert!(service.verify(&x, &first).await.is_err());
        }
        service.verify(&x, &second).await.unwrap();
    }

    #[tokio::test]
    async fn password_update_requires_verified_record_once() {
        let mailer = Arc::new(CapturingMailer::default());
        let service = service(mailer.clone(), 600);
        let x = user("x@example.com");

        assert!(matches!(
            service.ensure_verified(&x).await,
            Err(AppError::Validation { ref message, .. }) if message == "OTP verification required"
        ));

        service.send_code(&x, OtpDelivery::First).await.unwrap();
        assert!(service.ensure_verified(&x).await.is_err());

        service.verify(&x, &mailer.last_code_for("x@example.com")).await.unwrap();
        // Проверка не гасит запись: при сбое сохранения пароль можно отправить снова
        service.ensure_verified(&x).await.unwrap();
        service.ensure_verified(&x).await.unwrap();

        service.complete(&x).await.unwrap();
        assert!(service.ensure_verified(&x).await.is_err());
    }

    #[tokio::test]
    async fn too_many_wrong_codes_drop_the_record() {
        let mailer = Arc::new(CapturingMailer::default());
        let service = service(mailer.clone(), 600);
        let x = user("x@example.com");

        service.send_code(&x, OtpDelivery::First).await.unwrap();
        let code = mailer.last_code_for("x@example.com");
        let wrong = if code == "123456" { "654321" } else { "123456" };

        for _ in 0..MAX_OTP_ATTEMPTS - 1 {
            assert!(service.verify(&x, wrong).await.is_err());
        }
        // Счетчик переживает перезапись записи
        let record = service.store.get(x.id).await.unwrap().unwrap();
        assert_eq!(record.attempts, MAX_OTP_ATTEMPTS - 1);

        assert!(service.verify(&x, wrong).await.is_err());
        assert!(service.store.get(x.id).await.unwrap().is_none());
        let err = service.verify(&x, &code).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { ref message, .. } if message == "Invalid OTP"));

        // Новый код снова работает
        service.send_code(&x, OtpDelivery::Resend).await.unwrap();
        service.verify(&x, &mailer.last_code_for("x@example.com")).await.unwrap();
    }

    #[tokio::test]
    async fn expired_codes_are_rejected() {
        let mailer = Arc::new(CapturingMailer::default());
        let service = service(mailer.clone(), -1);
        let x = user("x@example.com");

        service.send_code(&x, OtpDelivery::First).await.unwrap();
        let err = service
            .verify(&x, &mailer.last_code_for("x@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { ref message, .. } if message == "Invalid OTP"));
    }

    #[tokio::test]
    async fn mail_failure_is_upstream_error() {
        let service = service(Arc::new(FailingMailer), 600);
        let err = service
            .send_code(&user("x@example.com"), OtpDelivery::Resend)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream(ref m) if m == "Error resending OTP"));
    }
}
