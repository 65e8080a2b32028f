//! Error types for probe collaborators.
//!
//! None of these reach the scheduler: each probe turns them into issues.

use thiserror::Error;

/// Errors while fetching a peer certificate chain.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("url has no host")]
    MissingHost,

    #[error("invalid server name: {0}")]
    ServerName(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("tls setup failed: {0}")]
    Tls(#[from] rustls::Error),

    #[error("tls setup failed: {0}")]
    Setup(String),

    #[error("timed out")]
    Timeout,

    #[error("failed to parse certificate: {0}")]
    Parse(String),
}

/// Errors reported by a timestamp service backend.
#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("malformed timestamp: {0}")]
    Malformed(String),

    #[error("{0}")]
    Verification(String),
}

/// Errors from scheme manager downloads and key validation.
#[derive(Debug, Error)]
pub enum SchemeError {
    #[error("HTTP Code {0}")]
    Status(u16),

    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed index line {line}: {reason}")]
    Index { line: usize, reason: String },

    #[error("scheme has not been downloaded yet")]
    NotUpdated,

    #[error("pk.pem is missing")]
    MissingPublicKey,

    #[error("downloaded pk.pem does not match the pinned public key")]
    KeyMismatch,

    #[error("index signature is missing or empty")]
    MissingSignature,

    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),
}
