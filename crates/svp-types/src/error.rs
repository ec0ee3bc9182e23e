//! Error types for the SVP marketplace.
//!
//! All errors use the `SVP_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Ledger errors
//! - 2xx: Crypto / identity errors
//! - 3xx: Protocol errors
//! - 4xx: Runtime errors
//! - 9xx: General / internal errors

use thiserror::Error;

use crate::{AccountName, constants};

/// Central error enum for all SVP operations.
///
/// `Clone` so that one failure can be broadcast as a notification and
/// returned to the caller at the same time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SvpError {
    // =================================================================
    // Ledger Errors (1xx)
    // =================================================================
    /// The ledger rejected or failed a call for a non-rate-limit reason.
    #[error("SVP_ERR_100: Ledger call failed: {detail}")]
    Ledger { detail: String },

    /// The author wrote too soon after its previous write.
    #[error("SVP_ERR_101: Rate limited by ledger: {detail}")]
    RateLimited { detail: String },

    /// A content item that must exist was not found.
    #[error("SVP_ERR_102: Content not found: {author}/{permlink}")]
    ContentNotFound { author: String, permlink: String },

    // =================================================================
    // Crypto / Identity Errors (2xx)
    // =================================================================
    /// A box could not be opened: wrong key, wrong nonce or tampered data.
    #[error("SVP_ERR_200: Authentication failure: box could not be opened")]
    AuthenticationFailure,

    /// The identity has not published a public key.
    #[error("SVP_ERR_201: Unknown identity: {0}")]
    UnknownIdentity(AccountName),

    /// A published public key or nonce could not be parsed.
    #[error("SVP_ERR_202: Invalid public key material: {reason}")]
    InvalidPublicKey { reason: String },

    /// Encryption failed (non-contributory key exchange, cipher failure).
    #[error("SVP_ERR_203: Encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    // =================================================================
    // Protocol Errors (3xx)
    // =================================================================
    /// The provider returned no payload for a paid order.
    #[error("SVP_ERR_300: Provider not ready for buyer {0}")]
    ProviderNotReady(AccountName),

    /// The seller's root post does not point at a session.
    #[error("SVP_ERR_301: No active session for seller {0}")]
    NoActiveSession(AccountName),

    /// Service terms are unusable (e.g. zero cost).
    #[error("SVP_ERR_302: Invalid service terms: {reason}")]
    InvalidTerms { reason: String },

    /// The provider callback failed.
    #[error("SVP_ERR_303: Provider failed: {reason}")]
    Provider { reason: String },

    // =================================================================
    // Runtime Errors (4xx)
    // =================================================================
    /// `start` was called on a lifecycle that is not idle.
    #[error("SVP_ERR_400: Lifecycle already running")]
    AlreadyRunning,

    /// The write queue dropped the request before answering.
    #[error("SVP_ERR_401: Write queue closed")]
    QueueClosed,

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("SVP_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("SVP_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("SVP_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl SvpError {
    /// Classify a raw ledger failure detail.
    ///
    /// Details carrying one of the two rate-limit sentinels become
    /// [`SvpError::RateLimited`]; everything else is [`SvpError::Ledger`].
    #[must_use]
    pub fn from_ledger_detail(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        if detail.contains(constants::RATE_LIMIT_ROOT_SENTINEL)
            || detail.contains(constants::RATE_LIMIT_REPLY_SENTINEL)
        {
            Self::RateLimited { detail }
        } else {
            Self::Ledger { detail }
        }
    }

    /// Whether this is a per-author write rate-limit rejection.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Whether retrying the same operation later can succeed.
    ///
    /// Polling loops keep running on transient errors and fail-stop on the
    /// rest.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Ledger { .. })
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, SvpError>;

impl From<serde_json::Error> for SvpError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
