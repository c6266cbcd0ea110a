//! Turn-level error taxonomy

use thiserror::Error;

/// Errors that end a turn.
///
/// Every variant is terminal for the turn it occurs in; nothing is retried.
/// The escalation ledger never produces one of these: it always yields a
/// reply, even when the backend matched nothing.
#[derive(Debug, Error)]
pub enum TurnError {
    /// Empty or missing utterance without an initiation event.
    #[error("invalid turn: {0}")]
    Validation(String),

    /// Credential bundle missing, unparsable, or signing key malformed.
    #[error("credential error: {0}")]
    Credential(String),

    /// The identity provider rejected the signed assertion.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// The NLU backend answered with a non-success status.
    #[error("backend returned HTTP {status}: {message}")]
    Backend { status: u16, message: String },

    /// Network failure reaching the identity provider or the backend.
    #[error("transport failure: {0}")]
    Transport(String),
}
