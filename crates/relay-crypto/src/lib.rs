//! # relay-crypto
//!
//! The two small cryptographic concerns the core itself owns (Section 4.1,
//! 4.2). Everything else — content encryption, key exchange — is the
//! client's job; the server only ever touches opaque envelopes.
//!
//! ## Modules
//!
//! - [`token`] — bearer token verification (C1)
//! - [`idgen`] — random hex identifier generation (C2)

pub mod idgen;
pub mod token;

pub use idgen::generate_hex;
pub use token::{TokenError, TokenVerifier};

/// Error types for this crate's operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error(transparent)]
    Token(#[from] TokenError),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
