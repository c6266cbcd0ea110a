//! Front-end envelope types

use serde::{Deserialize, Serialize};

use crate::ledger::{ConversationContext, ConversationState};
use crate::orchestrator::{Turn, TurnReply};

/// Inbound turn envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    #[serde(default)]
    pub input_message: Option<InputMessage>,
    #[serde(default)]
    pub language_code: Option<String>,
    pub bot_session_id: String,
    #[serde(default)]
    pub bot_contexts: Vec<ConversationContext>,
    #[serde(default)]
    pub event: Option<InitiationEvent>,
}

/// The user utterance.
#[derive(Debug, Default, Deserialize)]
pub struct InputMessage {
    #[serde(default)]
    pub text: String,
}

/// Non-text conversation opener.
#[derive(Debug, Deserialize)]
pub struct InitiationEvent {
    pub name: String,
}

impl From<TurnRequest> for Turn {
    fn from(request: TurnRequest) -> Self {
        Turn {
            utterance: request
                .input_message
                .map(|message| message.text)
                .unwrap_or_default(),
            language_code: request.language_code,
            session_id: request.bot_session_id,
            event: request.event.map(|event| event.name),
            contexts: request.bot_contexts,
        }
    }
}

/// Outbound turn envelope.
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub replymessages: Vec<ReplyMessage>,
    pub intent: String,
    pub confidence: f32,
    #[serde(rename = "botContexts")]
    pub bot_contexts: Vec<ConversationContext>,
    #[serde(rename = "botState")]
    pub bot_state: BotState,
}

/// One reply element; this adapter only produces text replies.
#[derive(Debug, Serialize)]
pub struct ReplyMessage {
    pub r#type: &'static str,
    pub text: String,
}

impl ReplyMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            r#type: "Text",
            text: text.into(),
        }
    }
}

/// Front-end two-valued continuation vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BotState {
    Moredata,
    Complete,
}

impl From<ConversationState> for BotState {
    fn from(state: ConversationState) -> Self {
        match state {
            ConversationState::Continue => BotState::Moredata,
            ConversationState::Complete => BotState::Complete,
        }
    }
}

impl From<TurnReply> for TurnResponse {
    fn from(reply: TurnReply) -> Self {
        Self {
            replymessages: vec![ReplyMessage::text(reply.reply_text)],
            intent: reply.intent,
            confidence: reply.confidence,
            bot_contexts: reply.contexts,
            bot_state: reply.state.into(),
        }
    }
}

/// Error body returned on failed turns.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
