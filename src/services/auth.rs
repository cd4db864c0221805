use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::{AppError, AppResult};
use crate::models::{Role, User};

/// Содержимое JWT. `sub` - id пользователя.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expires_in_hours: i64,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            expires_in_hours: config.expires_in_hours,
        }
    }

    pub fn issue(&self, user: &User) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id,
            role: user.role,
            iat: now,
            exp: now + self.expires_in_hours * 3600,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Unexpected(format!("failed to sign token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &Validation::default()).map(|data| data.claims)
    }
}

/// bcrypt в отдельном blocking-потоке, чтобы не занимать воркеры tokio.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, password: &str) -> AppResult<String> {
        let password = password.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AppError::Unexpected(format!("hashing task failed: {}", e)))?
            .map_err(|e| AppError::Unexpected(format!("failed to hash password: {}", e)))
    }

    pub async fn verify(&self, password: &str, hash: &str) -> AppResult<bool> {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AppError::Unexpected(format!("hashing task failed: {}", e)))?
            .map_err(|e| AppError::Unexpected(format!("failed to verify password: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Ann".to_string(),
            email: "ann@example.com".to_string(),
            password_hash: String::new(),
            role,
            created_at: Utc::now(),
        }
    }

    fn config(secret: &str, hours: i64) -> JwtConfig {
        JwtConfig {
            secret: secret.to_string(),
            expires_in_hours: hours,
            bcrypt_cost: 4,
        }
    }

    #[test]
    fn issued_token_round_trips_claims() {
        let tokens = TokenService::new(&config("secret", 1));
        let user = user(Role::Organizer);
        let claims = tokens.verify(&tokens.issue(&user).unwrap()).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Organizer);
    }

    #[test]
    fn rejects_foreign_and_expired_tokens() {
        let ours = TokenService::new(&config("secret", 1));
        let theirs = TokenService::new(&config("other", 1));
        let token = theirs.issue(&user(Role::Admin)).unwrap();
        assert!(ours.verify(&token).is_err());

        let expired = TokenService::new(&config("secret", -2));
        let token = expired.issue(&user(Role::Admin)).unwrap();
        assert!(ours.verify(&token).is_err());
    }

    #[tokio::test]
    async fn hashes_and_verifies_passwords() {
        let hasher = PasswordHasher::new(4);
        let hash = hasher.hash("s3cret").await.unwrap();
        assert_ne!(hash, "s3cret");
        assert!(hasher.verify("s3cret", &hash).await.unwrap());
        assert!(!hasher.verify("wrong", &hash).await.unwrap());
    }
}
