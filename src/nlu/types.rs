//! Exchange types for the detect-intent call

use crate::ledger::ConversationContext;

/// Reply used when the backend answers without fulfillment text.
pub const DEFAULT_REPLY_TEXT: &str = "I'm not sure how to respond to that.";

/// Intent name used when the backend matched nothing at all.
pub const UNKNOWN_INTENT: &str = "UNKNOWN";

/// One turn's input to the backend.
#[derive(Debug, Clone)]
pub struct NluQuery {
    pub session_id: String,
    pub text: String,
    pub language_code: String,
    /// Initiation event name; when set, the backend is queried by event
    /// instead of by text.
    pub event: Option<String>,
    /// Inbound contexts, passed through unfiltered; the backend matches on
    /// the names it recognizes.
    pub contexts: Vec<ConversationContext>,
}

/// The backend's verdict for one turn.
///
/// Defaults are applied while normalizing the wire response: `reply_text`
/// falls back to [`DEFAULT_REPLY_TEXT`], `intent` to [`UNKNOWN_INTENT`],
/// `confidence` to 0.0, `contexts` to empty.
#[derive(Debug, Clone)]
pub struct NluOutcome {
    pub reply_text: String,
    pub intent: String,
    pub confidence: f32,
    pub contexts: Vec<ConversationContext>,
}
