//! Property-based tests for the escalation ledger
//!
//! These verify the continuity invariants across arbitrary context traffic.

use proptest::prelude::*;
use serde_json::Value;

use super::context::ConversationContext;
use super::escalation::{
    decide, ConversationState, EscalationPolicy, DEFAULT_FALLBACK_INTENT,
    FALLBACK_COUNTER_LABEL, HANDOFF_REPLY,
};
use crate::nlu::NluOutcome;

const COUNTER_NAME: &str =
    "projects/prj/agent/sessions/sess/contexts/fallback_counter";

// ============================================================================
// Test Helpers
// ============================================================================

fn outcome(intent: &str, contexts: Vec<ConversationContext>) -> NluOutcome {
    NluOutcome {
        reply_text: "backend reply".to_string(),
        intent: intent.to_string(),
        confidence: 0.5,
        contexts,
    }
}

fn intent_for(fallback: bool) -> &'static str {
    if fallback {
        DEFAULT_FALLBACK_INTENT
    } else {
        "Greeting"
    }
}

fn counter_copies(contexts: &[ConversationContext]) -> usize {
    contexts
        .iter()
        .filter(|c| c.matches_label(FALLBACK_COUNTER_LABEL))
        .count()
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_context() -> impl Strategy<Value = ConversationContext> {
    ("[a-z]{1,12}", 0u32..5).prop_map(|(label, lifespan)| {
        ConversationContext::new(
            format!("projects/prj/agent/sessions/sess/contexts/{label}"),
            lifespan,
        )
    })
}

fn arb_counter() -> impl Strategy<Value = ConversationContext> {
    (0u32..6, 0u32..3).prop_map(|(count, lifespan)| {
        ConversationContext::new(COUNTER_NAME, lifespan)
            .with_parameter("count", Value::String(count.to_string()))
    })
}

fn arb_context_set() -> impl Strategy<Value = Vec<ConversationContext>> {
    (
        proptest::collection::vec(arb_context(), 0..4),
        proptest::option::of(arb_counter()),
    )
        .prop_map(|(mut contexts, counter)| {
            if let Some(counter) = counter {
                contexts.push(counter);
            }
            contexts
        })
}

// ============================================================================
// Invariants
// ============================================================================

proptest! {
    /// At most one counter context ever leaves the ledger, whatever the
    /// caller and the backend echoed in.
    #[test]
    fn outbound_set_never_holds_two_counters(
        inbound in arb_context_set(),
        echoed in arb_context_set(),
        fallback in any::<bool>(),
    ) {
        let decision = decide(
            &EscalationPolicy::default(),
            &inbound,
            &outcome(intent_for(fallback), echoed),
            COUNTER_NAME,
        );
        prop_assert!(counter_copies(&decision.contexts) <= 1);
    }

    /// Running the ledger on its own output must not create duplicates.
    #[test]
    fn ledger_is_idempotent_over_its_own_output(
        inbound in arb_context_set(),
        fallback in any::<bool>(),
    ) {
        let policy = EscalationPolicy::default();
        let intent = intent_for(fallback);
        let first = decide(&policy, &inbound, &outcome(intent, inbound.clone()), COUNTER_NAME);
        let second = decide(
            &policy,
            &first.contexts,
            &outcome(intent, first.contexts.clone()),
            COUNTER_NAME,
        );
        prop_assert!(counter_copies(&second.contexts) <= 1);
    }

    /// Consecutive unresolved turns count 1, 2, ... up to the threshold,
    /// where the conversation completes with the hand-off reply.
    #[test]
    fn consecutive_fallbacks_escalate_monotonically(
        extra in proptest::collection::vec(arb_context(), 0..3),
    ) {
        let policy = EscalationPolicy::default();
        let mut carried = extra;
        for expected in 1..=policy.threshold {
            let decision = decide(
                &policy,
                &carried,
                &outcome(DEFAULT_FALLBACK_INTENT, carried.clone()),
                COUNTER_NAME,
            );
            let counter = decision
                .contexts
                .iter()
                .find(|c| c.matches_label(FALLBACK_COUNTER_LABEL))
                .expect("counter emitted");
            prop_assert_eq!(counter.count(), expected);
            if expected == policy.threshold {
                prop_assert_eq!(decision.state, ConversationState::Complete);
                prop_assert_eq!(counter.lifespan_count, 0);
                prop_assert_eq!(decision.reply_text.as_str(), HANDOFF_REPLY);
            } else {
                prop_assert_eq!(decision.state, ConversationState::Continue);
                prop_assert_eq!(counter.lifespan_count, 1);
            }
            carried = decision.contexts;
        }
    }

    /// A resolved turn resets the streak no matter how long it was, and the
    /// next unresolved turn starts over at 1.
    #[test]
    fn any_resolved_turn_resets_the_streak(
        streak in 1u32..3,
        extra in proptest::collection::vec(arb_context(), 0..3),
    ) {
        let policy = EscalationPolicy::default();
        let mut inbound = extra;
        inbound.push(
            ConversationContext::new(COUNTER_NAME, 1)
                .with_parameter("count", Value::String(streak.to_string())),
        );

        let reset = decide(
            &policy,
            &inbound,
            &outcome("OrderStatus", inbound.clone()),
            COUNTER_NAME,
        );
        let expiry = reset
            .contexts
            .iter()
            .find(|c| c.matches_label(FALLBACK_COUNTER_LABEL))
            .expect("expiry emitted");
        prop_assert_eq!(expiry.lifespan_count, 0);
        prop_assert_eq!(reset.state, ConversationState::Continue);

        // A well-behaved caller drops expired contexts before echoing.
        let echoed: Vec<ConversationContext> = reset
            .contexts
            .into_iter()
            .filter(|c| c.lifespan_count > 0)
            .collect();
        let next = decide(
            &policy,
            &echoed,
            &outcome(DEFAULT_FALLBACK_INTENT, echoed.clone()),
            COUNTER_NAME,
        );
        let counter = next
            .contexts
            .iter()
            .find(|c| c.matches_label(FALLBACK_COUNTER_LABEL))
            .expect("counter emitted");
        prop_assert_eq!(counter.count(), 1);
    }

    /// Feeding each turn's outbound contexts back as the next turn's inbound
    /// set reproduces the reference counter progression.
    #[test]
    fn round_trip_matches_reference_fold(
        turns in proptest::collection::vec(any::<bool>(), 1..10),
    ) {
        let policy = EscalationPolicy::default();
        let mut carried: Vec<ConversationContext> = vec![];
        let mut expected: u32 = 0;

        for fallback in turns {
            if expected >= policy.threshold {
                break;
            }
            let decision = decide(
                &policy,
                &carried,
                &outcome(intent_for(fallback), carried.clone()),
                COUNTER_NAME,
            );
            expected = if fallback { expected + 1 } else { 0 };

            if fallback {
                let counter = decision
                    .contexts
                    .iter()
                    .find(|c| c.matches_label(FALLBACK_COUNTER_LABEL))
                    .expect("counter emitted");
                prop_assert_eq!(counter.count(), expected);
            }
            let completed = fallback && expected == policy.threshold;
            prop_assert_eq!(
                decision.state,
                if completed { ConversationState::Complete } else { ConversationState::Continue }
            );

            carried = decision
                .contexts
                .into_iter()
                .filter(|c| c.lifespan_count > 0)
                .collect();
        }
    }
}
