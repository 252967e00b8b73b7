//! # BookShelf accounts API
//!
//! Credential issuance and account recovery service for the BookShelf
//! platform: registration with email verification, password login, OTP
//! based password recovery, and JWT session management.
//!
//! ## Account lifecycle
//!
//! Accounts start unverified; the first session token is minted only
//! when the emailed verification link is consumed. One-time secrets
//! (verification tokens and recovery OTPs) are stored as SHA-256
//! digests and expire on their own. Password changes revoke every
//! session token issued before the change.
//!
//! ## Anti-enumeration
//!
//! Resend-verification and forgot-password answer identically whether
//! or not the email is registered, and login failures never reveal
//! which credential was wrong.

pub mod api;
pub mod cli;
pub mod notify;
pub mod store;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
