//! Fallback-escalation decision logic
//!
//! The adapter holds no session table, so the number of consecutive
//! unresolved turns travels inside a counter context the caller echoes back
//! every turn. Deciding a turn is a pure function of that inbound set and
//! the backend's verdict; every counter emission filters existing copies
//! first, so the outbound set never accumulates duplicates.

use serde_json::Value;

use super::context::ConversationContext;
use crate::nlu::NluOutcome;

/// Intent name the backend reports when nothing matched.
pub const DEFAULT_FALLBACK_INTENT: &str = "Default Fallback Intent";

/// Trailing label of the counter context.
pub const FALLBACK_COUNTER_LABEL: &str = "fallback_counter";

/// Consecutive unresolved turns before the conversation is handed off.
pub const DEFAULT_ESCALATION_THRESHOLD: u32 = 3;

/// Reply sent while the user still gets another try.
pub const REPHRASE_REPLY: &str =
    "Sorry, I didn't get that. Could you say it another way?";

/// Reply sent when the conversation is handed off.
pub const HANDOFF_REPLY: &str = "I'm sorry, I wasn't able to help with that. \
     Please contact a human agent for further assistance.";

/// How the counter context is recognized in a context set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextMatch {
    /// Match the trailing label, ignoring the project/session prefix.
    #[default]
    LabelSuffix,
    /// Require the whole name to equal the configured label.
    FullPath,
}

impl ContextMatch {
    /// Parses the configuration value; anything unrecognized falls back to
    /// the default label-suffix strategy.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("full_path") {
            Self::FullPath
        } else {
            Self::LabelSuffix
        }
    }
}

/// Escalation policy knobs.
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    pub fallback_intent: String,
    pub counter_label: String,
    pub threshold: u32,
    pub matching: ContextMatch,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            fallback_intent: DEFAULT_FALLBACK_INTENT.to_string(),
            counter_label: FALLBACK_COUNTER_LABEL.to_string(),
            threshold: DEFAULT_ESCALATION_THRESHOLD,
            matching: ContextMatch::default(),
        }
    }
}

impl EscalationPolicy {
    /// Overrides the hand-off threshold; clamped to at least 1.
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold.max(1);
        self
    }

    pub fn with_matching(mut self, matching: ContextMatch) -> Self {
        self.matching = matching;
        self
    }

    fn is_counter(&self, context: &ConversationContext) -> bool {
        match self.matching {
            ContextMatch::LabelSuffix => context.matches_label(&self.counter_label),
            ContextMatch::FullPath => context.name == self.counter_label,
        }
    }

    fn counter_in<'a>(
        &self,
        contexts: &'a [ConversationContext],
    ) -> Option<&'a ConversationContext> {
        contexts.iter().find(|c| self.is_counter(c))
    }
}

/// Whether the conversation goes on after this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Continue,
    Complete,
}

/// One turn's ledger output: the reply to send, the context set to return,
/// and whether the conversation continues.
#[derive(Debug, Clone)]
pub struct LedgerDecision {
    pub reply_text: String,
    pub contexts: Vec<ConversationContext>,
    pub state: ConversationState,
}

/// Applies the escalation policy to one turn.
///
/// `counter_name` is the full context path used when a counter has to be
/// emitted and no prior copy supplies one.
pub fn decide(
    policy: &EscalationPolicy,
    inbound: &[ConversationContext],
    outcome: &NluOutcome,
    counter_name: &str,
) -> LedgerDecision {
    let streak = policy
        .counter_in(inbound)
        .map(ConversationContext::count)
        .unwrap_or(0);

    // Everything the backend emitted survives except counter copies; the
    // counter is re-emitted below under this turn's verdict.
    let mut contexts: Vec<ConversationContext> = outcome
        .contexts
        .iter()
        .filter(|c| !policy.is_counter(c))
        .cloned()
        .collect();

    let emitted_name = policy
        .counter_in(inbound)
        .or_else(|| policy.counter_in(&outcome.contexts))
        .map_or_else(|| counter_name.to_string(), |c| c.name.clone());

    if outcome.intent != policy.fallback_intent {
        let had_counter = policy.counter_in(inbound).is_some()
            || policy.counter_in(&outcome.contexts).is_some();
        if had_counter {
            contexts.push(counter_context(emitted_name, 0, 0));
        }
        return LedgerDecision {
            reply_text: outcome.reply_text.clone(),
            contexts,
            state: ConversationState::Continue,
        };
    }

    let count = streak + 1;
    if count >= policy.threshold {
        contexts.push(counter_context(emitted_name, 0, count));
        LedgerDecision {
            reply_text: HANDOFF_REPLY.to_string(),
            contexts,
            state: ConversationState::Complete,
        }
    } else {
        contexts.push(counter_context(emitted_name, 1, count));
        LedgerDecision {
            reply_text: REPHRASE_REPLY.to_string(),
            contexts,
            state: ConversationState::Continue,
        }
    }
}

fn counter_context(name: String, lifespan: u32, count: u32) -> ConversationContext {
    ConversationContext::new(name, lifespan)
        .with_parameter("count", Value::String(count.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COUNTER_NAME: &str =
        "projects/prj/agent/sessions/sess/contexts/fallback_counter";

    fn outcome(intent: &str, contexts: Vec<ConversationContext>) -> NluOutcome {
        NluOutcome {
            reply_text: "backend says hi".to_string(),
            intent: intent.to_string(),
            confidence: 0.85,
            contexts,
        }
    }

    fn counter(count: u32) -> ConversationContext {
        ConversationContext::new(COUNTER_NAME, 1)
            .with_parameter("count", Value::String(count.to_string()))
    }

    fn find_counter(decision: &LedgerDecision) -> Option<&ConversationContext> {
        decision
            .contexts
            .iter()
            .find(|c| c.matches_label(FALLBACK_COUNTER_LABEL))
    }

    #[test]
    fn first_fallback_starts_the_streak() {
        let policy = EscalationPolicy::default();
        let decision = decide(
            &policy,
            &[],
            &outcome(DEFAULT_FALLBACK_INTENT, vec![]),
            COUNTER_NAME,
        );

        let emitted = find_counter(&decision).expect("counter emitted");
        assert_eq!(emitted.count(), 1);
        assert_eq!(emitted.lifespan_count, 1);
        assert_eq!(emitted.parameters["count"], json!("1"));
        assert_eq!(decision.reply_text, REPHRASE_REPLY);
        assert_eq!(decision.state, ConversationState::Continue);
    }

    #[test]
    fn second_fallback_increments() {
        let policy = EscalationPolicy::default();
        let inbound = vec![counter(1)];
        let decision = decide(
            &policy,
            &inbound,
            &outcome(DEFAULT_FALLBACK_INTENT, inbound.clone()),
            COUNTER_NAME,
        );

        let emitted = find_counter(&decision).expect("counter emitted");
        assert_eq!(emitted.count(), 2);
        assert_eq!(emitted.lifespan_count, 1);
        assert_eq!(decision.state, ConversationState::Continue);
    }

    #[test]
    fn third_fallback_hands_off() {
        let policy = EscalationPolicy::default();
        let inbound = vec![counter(2)];
        let decision = decide(
            &policy,
            &inbound,
            &outcome(DEFAULT_FALLBACK_INTENT, inbound.clone()),
            COUNTER_NAME,
        );

        let emitted = find_counter(&decision).expect("counter emitted");
        assert_eq!(emitted.count(), 3);
        assert_eq!(emitted.lifespan_count, 0);
        assert_eq!(decision.reply_text, HANDOFF_REPLY);
        assert_eq!(decision.state, ConversationState::Complete);
    }

    #[test]
    fn resolved_intent_expires_an_existing_counter() {
        let policy = EscalationPolicy::default();
        let inbound = vec![counter(2)];
        let decision = decide(
            &policy,
            &inbound,
            &outcome("OrderStatus", inbound.clone()),
            COUNTER_NAME,
        );

        let emitted = find_counter(&decision).expect("expiry emitted");
        assert_eq!(emitted.lifespan_count, 0);
        assert_eq!(emitted.count(), 0);
        assert_eq!(decision.reply_text, "backend says hi");
        assert_eq!(decision.state, ConversationState::Continue);
    }

    #[test]
    fn resolved_intent_without_counter_emits_nothing() {
        let policy = EscalationPolicy::default();
        let decision = decide(
            &policy,
            &[],
            &outcome("Greeting", vec![]),
            COUNTER_NAME,
        );

        assert!(find_counter(&decision).is_none());
        assert_eq!(decision.reply_text, "backend says hi");
        assert_eq!(decision.state, ConversationState::Continue);
    }

    #[test]
    fn expiry_is_emitted_even_when_backend_drops_the_echo() {
        let policy = EscalationPolicy::default();
        let inbound = vec![counter(1)];
        let decision = decide(
            &policy,
            &inbound,
            &outcome("Greeting", vec![]),
            COUNTER_NAME,
        );

        let emitted = find_counter(&decision).expect("expiry emitted");
        assert_eq!(emitted.lifespan_count, 0);
    }

    #[test]
    fn duplicate_backend_echoes_collapse_to_one_counter() {
        let policy = EscalationPolicy::default();
        let echoed = vec![
            counter(1),
            ConversationContext::new("projects/x/agent/sessions/y/contexts/topic", 3),
            counter(1),
        ];
        let decision = decide(
            &policy,
            &[counter(1)],
            &outcome(DEFAULT_FALLBACK_INTENT, echoed),
            COUNTER_NAME,
        );

        let counters = decision
            .contexts
            .iter()
            .filter(|c| c.matches_label(FALLBACK_COUNTER_LABEL))
            .count();
        assert_eq!(counters, 1);
        assert_eq!(decision.contexts.len(), 2);
    }

    #[test]
    fn non_counter_contexts_pass_through() {
        let policy = EscalationPolicy::default();
        let topic =
            ConversationContext::new("projects/x/agent/sessions/y/contexts/topic", 4);
        let decision = decide(
            &policy,
            &[],
            &outcome("Greeting", vec![topic.clone()]),
            COUNTER_NAME,
        );

        assert_eq!(decision.contexts, vec![topic]);
    }

    #[test]
    fn corrupt_count_restarts_from_one() {
        let policy = EscalationPolicy::default();
        let inbound = vec![ConversationContext::new(COUNTER_NAME, 1)
            .with_parameter("count", Value::String("banana".into()))];
        let decision = decide(
            &policy,
            &inbound,
            &outcome(DEFAULT_FALLBACK_INTENT, vec![]),
            COUNTER_NAME,
        );

        assert_eq!(find_counter(&decision).unwrap().count(), 1);
    }

    #[test]
    fn numeric_count_encoding_is_accepted() {
        let policy = EscalationPolicy::default();
        let inbound = vec![
            ConversationContext::new(COUNTER_NAME, 1).with_parameter("count", json!(2))
        ];
        let decision = decide(
            &policy,
            &inbound,
            &outcome(DEFAULT_FALLBACK_INTENT, vec![]),
            COUNTER_NAME,
        );

        assert_eq!(decision.state, ConversationState::Complete);
        assert_eq!(find_counter(&decision).unwrap().count(), 3);
    }

    #[test]
    fn emitted_counter_reuses_the_round_tripped_name() {
        let policy = EscalationPolicy::default();
        let custom = "projects/other/agent/sessions/abc/contexts/fallback_counter";
        let inbound = vec![ConversationContext::new(custom, 1)
            .with_parameter("count", Value::String("1".into()))];
        let decision = decide(
            &policy,
            &inbound,
            &outcome(DEFAULT_FALLBACK_INTENT, vec![]),
            COUNTER_NAME,
        );

        assert_eq!(find_counter(&decision).unwrap().name, custom);
    }

    #[test]
    fn fresh_counter_uses_the_supplied_name() {
        let policy = EscalationPolicy::default();
        let decision = decide(
            &policy,
            &[],
            &outcome(DEFAULT_FALLBACK_INTENT, vec![]),
            COUNTER_NAME,
        );

        assert_eq!(find_counter(&decision).unwrap().name, COUNTER_NAME);
    }

    #[test]
    fn full_path_matching_requires_exact_name() {
        let policy = EscalationPolicy {
            counter_label: COUNTER_NAME.to_string(),
            ..EscalationPolicy::default()
        }
        .with_matching(ContextMatch::FullPath);

        let elsewhere = ConversationContext::new(
            "projects/other/agent/sessions/abc/contexts/fallback_counter",
            1,
        )
        .with_parameter("count", Value::String("2".into()));
        let decision = decide(
            &policy,
            &[elsewhere],
            &outcome(DEFAULT_FALLBACK_INTENT, vec![]),
            COUNTER_NAME,
        );

        // Name differs from the configured path, so the streak starts over.
        assert_eq!(find_counter(&decision).unwrap().count(), 1);
    }

    #[test]
    fn matching_strategy_parses_from_configuration() {
        assert_eq!(ContextMatch::parse("full_path"), ContextMatch::FullPath);
        assert_eq!(ContextMatch::parse("FULL_PATH"), ContextMatch::FullPath);
        assert_eq!(ContextMatch::parse("label_suffix"), ContextMatch::LabelSuffix);
        assert_eq!(ContextMatch::parse("anything"), ContextMatch::LabelSuffix);
    }

    #[test]
    fn custom_threshold_is_honored() {
        let policy = EscalationPolicy::default().with_threshold(2);
        let inbound = vec![counter(1)];
        let decision = decide(
            &policy,
            &inbound,
            &outcome(DEFAULT_FALLBACK_INTENT, vec![]),
            COUNTER_NAME,
        );

        assert_eq!(decision.state, ConversationState::Complete);
        assert_eq!(decision.reply_text, HANDOFF_REPLY);
    }
}
