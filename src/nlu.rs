//! NLU backend abstraction
//!
//! Narrow seam over the detect-intent protocol so the turn pipeline can be
//! exercised against scripted backends.

mod dialogflow;
mod types;

pub use dialogflow::DialogflowClient;
pub use types::{NluOutcome, NluQuery, DEFAULT_REPLY_TEXT, UNKNOWN_INTENT};

use async_trait::async_trait;

use crate::auth::AccessToken;
use crate::error::TurnError;

/// One detect-intent round trip.
#[async_trait]
pub trait NluBackend: Send + Sync {
    /// Sends the turn to the backend and returns its raw verdict, before
    /// any escalation policy is applied.
    async fn detect_intent(
        &self,
        token: &AccessToken,
        query: &NluQuery,
    ) -> Result<NluOutcome, TurnError>;
}
