//! Dialogflow ES detect-intent client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::types::{NluOutcome, NluQuery, DEFAULT_REPLY_TEXT, UNKNOWN_INTENT};
use super::NluBackend;
use crate::auth::AccessToken;
use crate::error::TurnError;
use crate::ledger::ConversationContext;

const DEFAULT_BASE_URL: &str = "https://dialogflow.googleapis.com";

/// Client for the v2 detect-intent endpoint.
pub struct DialogflowClient {
    client: Client,
    project_id: String,
    base_url: String,
}

impl DialogflowClient {
    pub fn new(project_id: impl Into<String>, base_url: Option<&str>) -> Self {
        let base_url = match base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => DEFAULT_BASE_URL.to_string(),
        };

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            project_id: project_id.into(),
            base_url,
        }
    }

    fn session_url(&self, session_id: &str) -> String {
        format!(
            "{}/v2/projects/{}/agent/sessions/{}:detectIntent",
            self.base_url, self.project_id, session_id
        )
    }

    fn translate_request(query: &NluQuery) -> DetectIntentRequest {
        let query_input = match &query.event {
            Some(event) => QueryInput {
                text: None,
                event: Some(EventInput {
                    name: event.clone(),
                    language_code: query.language_code.clone(),
                }),
            },
            None => QueryInput {
                text: Some(TextInput {
                    text: query.text.clone(),
                    language_code: query.language_code.clone(),
                }),
                event: None,
            },
        };

        DetectIntentRequest {
            query_params: QueryParams {
                contexts: query.contexts.clone(),
            },
            query_input,
        }
    }

    fn normalize_response(response: DetectIntentResponse) -> NluOutcome {
        let result = response.query_result.unwrap_or_default();

        NluOutcome {
            reply_text: result
                .fulfillment_text
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| DEFAULT_REPLY_TEXT.to_string()),
            intent: result
                .intent
                .and_then(|intent| intent.display_name)
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| UNKNOWN_INTENT.to_string()),
            confidence: result.intent_detection_confidence.unwrap_or(0.0),
            contexts: result.output_contexts.unwrap_or_default(),
        }
    }

    fn backend_rejection(status: u16, body: &str) -> TurnError {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .map(|envelope| envelope.error.message)
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| body.to_string());

        TurnError::Backend { status, message }
    }
}

#[async_trait]
impl NluBackend for DialogflowClient {
    async fn detect_intent(
        &self,
        token: &AccessToken,
        query: &NluQuery,
    ) -> Result<NluOutcome, TurnError> {
        let request = Self::translate_request(query);

        let response = self
            .client
            .post(self.session_url(&query.session_id))
            .bearer_auth(token.reveal())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TurnError::Transport(format!("backend timeout: {e}"))
                } else {
                    TurnError::Transport(format!("backend unreachable: {e}"))
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            TurnError::Transport(format!("failed to read backend response: {e}"))
        })?;

        if !status.is_success() {
            return Err(Self::backend_rejection(status.as_u16(), &body));
        }

        let parsed: DetectIntentResponse =
            serde_json::from_str(&body).map_err(|e| TurnError::Backend {
                status: status.as_u16(),
                message: format!("unparsable backend response: {e}"),
            })?;

        Ok(Self::normalize_response(parsed))
    }
}

// Dialogflow wire types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentRequest {
    query_params: QueryParams,
    query_input: QueryInput,
}

#[derive(Debug, Serialize)]
struct QueryParams {
    contexts: Vec<ConversationContext>,
}

#[derive(Debug, Serialize)]
struct QueryInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<TextInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    event: Option<EventInput>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextInput {
    text: String,
    language_code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventInput {
    name: String,
    language_code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentResponse {
    query_result: Option<QueryResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResult {
    fulfillment_text: Option<String>,
    intent: Option<Intent>,
    intent_detection_confidence: Option<f32>,
    output_contexts: Option<Vec<ConversationContext>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Intent {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}
