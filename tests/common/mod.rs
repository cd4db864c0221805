#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

use conference_system::{
    build_router,
    config::Config,
    models::{NewUser, Role},
    services::mailer::{MailError, Mailer},
    services::otp::MemoryOtpStore,
    services::payment::{PaymentError, PaymentGateway, PaymentIntent},
    store::MemoryStore,
    AppState, Backends,
};

/// Шлюз, который отвечает фиксированным секретом или ошибкой 503.
#[derive(Default)]
pub struct FakeGateway {
    pub failing: AtomicBool,
    pub calls: AtomicUsize,
    pub last_amount: Mutex<Option<(i64, String)>>,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_amount.lock().unwrap() = Some((amount, currency.to_string()));
        if self.failing.load(Ordering::SeqCst) {
            return Err(PaymentError::Unavailable(503));
        }
        Ok(PaymentIntent {
            id: format!("pi_{}", n),
            client_secret: format!("pi_{}_secret_test", n),
        })
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    /// Код из последнего письма этому адресу.
    pub fn last_code_for(&self, email: &str) -> String {
        let sent = self.sent.lock().unwrap();
        let (_, body) = sent
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .expect("no email sent to this address");
        body.rsplit(' ').next().unwrap().to_string()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, _subject: &str, body: &str) -> Result<(), MailError> {
        self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
        Ok(())
    }
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub router: Router,
    pub gateway: Arc<FakeGateway>,
    pub mailer: Arc<RecordingMailer>,
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.jwt.bcrypt_cost = 4;
    config.notifications.base_backoff_ms = 1;
    config
}

pub fn spawn_app() -> TestApp {
    let gateway = Arc::new(FakeGateway::default());
    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState::assemble(
        test_config(),
        Backends {
            store: Arc::new(MemoryStore::new()),
            redis: None,
            payments: gateway.clone(),
            otp_store: Arc::new(MemoryOtpStore::new()),
            mailer: mailer.clone(),
        },
    );
    TestApp {
        router: build_router(state.clone()),
        state,
        gateway,
        mailer,
    }
}

pub struct Account {
    pub id: String,
    pub token: String,
    pub email: String,
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn register(&self, name: &str, email: &str, role: &str) -> Account {
        let (status, body) = self
            .post(
                "/api/auth/register",
                None,
                json!({ "name": name, "email": email, "password": "secret123", "role": role }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        Account {
            id: body["_id"].as_str().unwrap().to_string(),
            token: body["token"].as_str().unwrap().to_string(),
            email: email.to_string(),
        }
    }

    /// Администратора через API не зарегистрировать, создаем напрямую в хранилище.
    pub async fn create_admin(&self, name: &str, email: &str) -> Account {
        let password_hash = self.state.passwords.hash("secret123").await.unwrap();
        let user = self
            .state
            .store
            .insert_user(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password_hash,
                role: Role::Admin,
            })
            .await
            .unwrap();
        Account {
            id: user.id.to_string(),
            token: self.state.tokens.issue(&user).unwrap(),
            email: email.to_string(),
        }
    }

    pub async fn create_event(&self, organizer: &Account, name: &str, tickets: i32, price: f64) -> Value {
        let (status, body) = self
            .post(
                "/api/events",
                Some(&organizer.token),
                json!({
                    "name": name,
                    "date": "2030-05-01T10:00:00Z",
                    "venue": "Main Hall",
                    "description": "Talks and workshops",
                    "speakers": [{ "name": "Ferris", "bio": "Crab", "topic": "Ownership" }],
                    "ticketsAvailable": tickets,
                    "imageURL": "https://img.example.com/event.png",
                    "price": price,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create event failed: {}", body);
        body
    }

    /// Ждет, пока фоновый воркер доставит уведомления.
    pub async fn wait_for_notifications(&self, token: &str, expected: usize) -> Value {
        for _ in 0..100 {
            let (status, body) = self.get("/api/notifications", Some(token)).await;
            if status == StatusCode::OK && body.as_array().map_or(0, Vec::len) >= expected {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} notifications", expected);
    }
}
