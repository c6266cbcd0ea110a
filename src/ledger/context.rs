//! Conversational context carried between turns

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named, lifespan-counted piece of state round-tripped between the front
/// end, this adapter, and the NLU backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    /// Hierarchical path: `projects/{p}/agent/sessions/{s}/contexts/{label}`.
    pub name: String,
    /// Remaining turns this context survives; 0 expires it now.
    #[serde(default)]
    pub lifespan_count: u32,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl ConversationContext {
    pub fn new(name: impl Into<String>, lifespan_count: u32) -> Self {
        Self {
            name: name.into(),
            lifespan_count,
            parameters: Map::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Whether this context's trailing label matches `label`.
    ///
    /// The hierarchical prefix embeds project and session ids, which differ
    /// between what the front end echoes and what the backend emits, so
    /// continuity matching goes by the trailing label only.
    pub fn matches_label(&self, label: &str) -> bool {
        self.name == label || self.name.ends_with(&format!("/{label}"))
    }

    /// The `count` parameter as a non-negative integer.
    ///
    /// Accepts both string and number encodings. Absent or unparsable
    /// values read as 0; a corrupt counter degrades instead of failing the
    /// turn.
    pub fn count(&self) -> u32 {
        match self.parameters.get("count") {
            Some(Value::String(raw)) => raw.trim().parse().unwrap_or(0),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(0),
            _ => 0,
        }
    }
}
