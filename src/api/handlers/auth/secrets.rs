//! One-time secret generation and digesting.
//!
//! Only digests are ever persisted; the raw value exists in memory just
//! long enough to be handed to the notifier.

use chrono::{DateTime, Duration, Utc};
use rand::{Rng, rngs::OsRng};
use sha2::{Digest, Sha256};

use crate::store::PendingSecret;

const OTP_TTL_MINUTES: i64 = 15;
const VERIFICATION_TTL_MINUTES: i64 = 10;

/// A freshly minted secret: raw form for the notifier, digest and expiry
/// for the store.
#[derive(Clone, Debug)]
pub struct GeneratedSecret {
    pub raw: String,
    pub digest: Vec<u8>,
    pub expires_at: DateTime<Utc>,
}

impl GeneratedSecret {
    #[must_use]
    pub fn pending(&self) -> PendingSecret {
        PendingSecret {
            digest: self.digest.clone(),
            expires_at: self.expires_at,
        }
    }
}

/// Six decimal digits, `000000` through `999999`, valid for 15 minutes.
#[must_use]
pub fn generate_otp(now: DateTime<Utc>) -> GeneratedSecret {
    let code: u32 = OsRng.gen_range(0..1_000_000);
    let raw = format!("{code:06}");
    GeneratedSecret {
        digest: digest_secret(&raw),
        raw,
        expires_at: now + Duration::minutes(OTP_TTL_MINUTES),
    }
}

/// 32 random bytes hex encoded, valid for 10 minutes.
#[must_use]
pub fn generate_verification_token(now: DateTime<Utc>) -> GeneratedSecret {
    let mut bytes = [0u8; 32];
    OsRng.fill(&mut bytes);
    let raw = hex::encode(bytes);
    GeneratedSecret {
        digest: digest_secret(&raw),
        raw,
        expires_at: now + Duration::minutes(VERIFICATION_TTL_MINUTES),
    }
}

/// SHA-256 over the raw secret, the form stored and compared at rest.
#[must_use]
pub fn digest_secret(raw: &str) -> Vec<u8> {
    Sha256::digest(raw.as_bytes()).to_vec()
}
