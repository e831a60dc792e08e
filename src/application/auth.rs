//! Token verification collaborator.
//!
//! Credential issuance belongs to the auth service; the gateway only
//! verifies the token presented at the WebSocket handshake and resolves it
//! to a user id.

use async_trait::async_trait;
use jsonwebtoken::{decode, DecodingKey, Validation};
use uuid::Uuid;

use crate::shared::error::AppError;

/// JWT claims accepted at connect time
#[derive(Debug, serde::Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

/// Resolves an authentication token to a user identity.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Uuid, AppError>;
}

/// HMAC-signed JWT verification against the shared secret.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Uuid, AppError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::Unauthenticated(format!("invalid token: {}", e)))?;

        token_data
            .claims
            .sub
            .parse::<Uuid>()
            .map_err(|_| AppError::Unauthenticated("invalid user id in token".into()))
    }
}
