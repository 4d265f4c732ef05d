//! REST error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RestError {
    /// Client is not signed in; authenticated methods refuse to issue the
    /// request.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Server rejected the session (401); local session state is cleared.
    #[error("Session expired or invalid")]
    SessionExpired,

    /// Wallet is not whitelisted (418) or the access code was invalid (423).
    #[error("Access code required or invalid (status {status})")]
    AccessRequired { status: u16 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited")]
    RateLimited,

    /// Sign-in handshake completed without both a cookie and a nonce.
    #[error("Authentication incomplete: {0}")]
    AuthIncomplete(&'static str),

    /// Caller-supplied signer failed to produce a signature.
    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RestResult<T> = Result<T, RestError>;
