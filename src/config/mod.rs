use serde::Deserialize;
use std::env;
use std::str::FromStr;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub payment: PaymentConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub email: EmailConfig,
    pub otp: OtpConfig,
    pub notifications: NotificationConfig,
    pub purchases: PurchaseConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("unknown LOG_FORMAT '{}'", other),
        }
    }
}

/// Где хранятся данные: Postgres в проде, память для локального запуска и тестов.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => anyhow::bail!("unknown STORAGE_BACKEND '{}'", other),
        }
    }
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub url: Option<String>,
    pub pool_size: u32,
}

// Настройки Redis (кеш и OTP). Без URL кеш отключается.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
}

// Настройки JWT
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_in_hours: i64,
    pub bcrypt_cost: u32,
}

// Настройки платежного шлюза (Stripe payment intents)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub secret_key: Option<String>,
    pub api_url: String,
    pub timeout_seconds: u64,
}

// Настройки Circuit Breaker
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

// Настройки SMTP. Без хоста письма только логируются.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
}

// Неоплаченная покупка держит место не дольше ttl_seconds
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseConfig {
    pub ttl_seconds: i64,
    pub cleanup_interval_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            app: AppConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                environment: "development".to_string(),
                rust_log: "conference_system=debug,tower_http=debug".to_string(),
                log_format: LogFormat::Pretty,
            },
            database: DatabaseConfig {
                backend: StorageBackend::Memory,
                url: None,
                pool_size: 20,
            },
            redis: RedisConfig { url: None },
            jwt: JwtConfig {
                secret: "development-secret".to_string(),
                expires_in_hours: 24,
                bcrypt_cost: bcrypt::DEFAULT_COST,
            },
            payment: PaymentConfig {
                secret_key: None,
                api_url: "https://api.stripe.com".to_string(),
                timeout_seconds: 30,
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: 5,
                timeout_seconds: 60,
            },
            email: EmailConfig {
                smtp_host: None,
                smtp_port: 587,
                smtp_username: String::new(),
                smtp_password: String::new(),
                from: "Conference <no-reply@conference.local>".to_string(),
            },
            otp: OtpConfig { ttl_seconds: 600 },
            notifications: NotificationConfig {
                max_attempts: 3,
                base_backoff_ms: 200,
            },
            purchases: PurchaseConfig {
                ttl_seconds: 900,
                cleanup_interval_seconds: 60,
            },
        }
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} must be valid: {}", name, e)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();

        let backend: StorageBackend = parsed_var("STORAGE_BACKEND", StorageBackend::Postgres)?;
        let database_url = optional_var("DATABASE_URL");
        if backend == StorageBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when STORAGE_BACKEND=postgres");
        }

        let environment = var_or("ENVIRONMENT", &defaults.app.environment);
        let jwt_secret = match optional_var("JWT_SECRET") {
            Some(secret) => secret,
            None if environment == "development" => defaults.jwt.secret.clone(),
            None => anyhow::bail!("JWT_SECRET must be set outside development"),
        };

        Ok(Config {
            app: AppConfig {
                host: var_or("HOST", &defaults.app.host),
                port: parsed_var("PORT", defaults.app.port)?,
                environment,
                rust_log: var_or("RUST_LOG", &defaults.app.rust_log),
                log_format: parsed_var("LOG_FORMAT", defaults.app.log_format)?,
            },
            database: DatabaseConfig {
                backend,
                url: database_url,
                pool_size: parsed_var("DB_POOL_SIZE", defaults.database.pool_size)?,
            },
            redis: RedisConfig {
                url: optional_var("REDIS_URL"),
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                expires_in_hours: parsed_var("JWT_EXPIRES_IN_HOURS", defaults.jwt.expires_in_hours)?,
                bcrypt_cost: parsed_var("BCRYPT_COST", defaults.jwt.bcrypt_cost)?,
            },
            payment: PaymentConfig {
                secret_key: optional_var("STRIPE_SECRET_KEY"),
                api_url: var_or("STRIPE_API_URL", &defaults.payment.api_url),
                timeout_seconds: parsed_var("PAYMENT_TIMEOUT_SECONDS", defaults.payment.timeout_seconds)?,
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: parsed_var(
                    "CIRCUIT_BREAKER_FAILURE_THRESHOLD",
                    defaults.circuit_breaker.failure_threshold,
                )?,
                timeout_seconds: parsed_var(
                    "CIRCUIT_BREAKER_TIMEOUT_SECONDS",
                    defaults.circuit_breaker.timeout_seconds,
                )?,
            },
            email: EmailConfig {
                smtp_host: optional_var("SMTP_HOST"),
                smtp_port: parsed_var("SMTP_PORT", defaults.email.smtp_port)?,
                smtp_username: var_or("SMTP_USERNAME", ""),
                smtp_password: var_or("SMTP_PASSWORD", ""),
                from: var_or("EMAIL_FROM", &defaults.email.from),
            },
            otp: OtpConfig {
                ttl_seconds: parsed_var("OTP_TTL_SECONDS", defaults.otp.ttl_seconds)?,
            },
            notifications: NotificationConfig {
                max_attempts: parsed_var("NOTIFICATION_MAX_ATTEMPTS", defaults.notifications.max_attempts)?,
                base_backoff_ms: parsed_var(
                    "NOTIFICATION_BACKOFF_MS",
                    defaults.notifications.base_backoff_ms,
                )?,
            },
            purchases: PurchaseConfig {
                ttl_seconds: parsed_var("PURCHASE_TTL_SECONDS", defaults.purchases.ttl_seconds)?,
                cleanup_interval_seconds: parsed_var(
                    "PURCHASE_CLEANUP_INTERVAL_SECONDS",
                    defaults.purchases.cleanup_interval_seconds,
                )?,
            },
        })
    }
}
