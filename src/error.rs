//! Error types for eimg.
//!
//! Every failure mode surfaces as a distinct variant with a
//! human-readable message; nothing is silently swallowed. Crypto
//! messages are intentionally vague: a wrong passphrase and corrupted
//! ciphertext are indistinguishable to the caller by design of the AEAD.

use std::path::PathBuf;

use thiserror::Error;

/// Core error type for eimg operations.
#[derive(Error, Debug)]
pub enum EimgError {
    /// No credential has been stored yet.
    #[error("no API key configured; run `eimg set API=<your_key>` first")]
    ConfigMissing,

    /// The AEAD rejected the ciphertext: wrong passphrase or corrupted
    /// bytes. Library-level authentication failure.
    #[error("failed to decrypt API key: wrong passphrase or corrupted config")]
    Decryption,

    /// Decryption succeeded but the stored content hash does not match
    /// the recovered plaintext. Content-level corruption.
    #[error("API key integrity check failed: stored hash does not match")]
    Integrity,

    /// Connection failure or timeout talking to the remote service.
    #[error("network error: {0}")]
    Network(String),

    /// The remote service rejected the API key (HTTP 401/403).
    #[error("API key rejected by the service (invalid, expired, or rate limited)")]
    Auth,

    /// The remote service failed (HTTP 5xx).
    #[error("service error: HTTP {0} from the EPIC API")]
    Service(u16),

    /// Input date could not be parsed as YYYY-MM-DD.
    #[error("invalid date {0:?}: expected YYYY-MM-DD")]
    InvalidDate(String),

    /// A valid date that simply has no imagery.
    #[error("no images available for {0}")]
    NoImagesAvailable(String),

    /// The image endpoint returned a zero-byte body.
    #[error("download produced an empty file for {0}; nothing was saved")]
    EmptyDownload(String),

    /// Filesystem write denied.
    #[error("permission denied writing {}", .0.display())]
    Permission(PathBuf),

    /// Other filesystem faults.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file did not parse as JSON.
    #[error("config file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EimgError>;
