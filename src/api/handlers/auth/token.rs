//! Session token issue and verification.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::store::Role;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    /// Issue time, seconds. Compared against the account's last password
    /// change to revoke stale sessions.
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone, Debug)]
pub struct SignedToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

/// HS256 signer and verifier for session tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: i64,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secret: &SecretString, ttl_seconds: i64) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            ttl_seconds,
        }
    }

    pub fn issue(&self, account_id: Uuid, role: Role) -> Result<SignedToken, ApiError> {
        self.issue_at(account_id, role, Utc::now())
    }

    pub(crate) fn issue_at(
        &self,
        account_id: Uuid,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<SignedToken, ApiError> {
        let iat = now.timestamp();
        let claims = Claims {
            sub: account_id,
            role,
            iat,
            exp: iat + self.ttl_seconds,
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| ApiError::Internal(anyhow::Error::new(err).context("token signing")))?;
        Ok(SignedToken {
            token,
            issued_at: now,
        })
    }

    /// Decode and validate a presented token. Expired and malformed
    /// tokens get the same outward answer.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        match jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => Ok(data.claims),
            Err(err) if matches!(err.kind(), ErrorKind::ExpiredSignature) => {
                debug!("session token expired");
                Err(ApiError::TokenInvalid)
            }
            Err(err) => {
                debug!("session token rejected: {err}");
                Err(ApiError::TokenInvalid)
            }
        }
    }
}
