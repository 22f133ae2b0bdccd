//! Tool-use policy for the oracle.
//!
//! The model may not tell a guest that a slot is free, taken, or booked
//! unless the deterministic checker was actually consulted in the same
//! turn-cycle. The policy is a post-condition on oracle responses, not
//! something the model is trusted to self-enforce.

/// Oracle re-prompts allowed before the turn degrades to the
/// manual-contact reply.
pub const MAX_TOOL_RETRIES: u32 = 2;

/// Phrases that read as an availability or booking claim, in the
/// languages guests write in.
const CLAIM_PHRASES: &[&str] = &[
    "prost", "prosta", "prosto", "na voljo", "zaseden", "zasedeno", "rezervirano",
    "rezervirana", "potrjeno", "available", "booked", "confirmed", "free slot",
];

pub const MANUAL_CONTACT_REPLY: &str =
    "Oprostite, razpoložljivosti trenutno ne morem zanesljivo preveriti. Pokličite nas na \
     02 700 12 34 ali pišite na info@kmetijapodgoro.si in z veseljem uredimo rezervacijo.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Retry { reason: &'static str },
    Degrade { reason: &'static str, user_message: String },
}

#[derive(Clone, Debug)]
pub struct ToolUsePolicy {
    max_retries: u32,
}

impl Default for ToolUsePolicy {
    fn default() -> Self {
        Self { max_retries: MAX_TOOL_RETRIES }
    }
}

impl ToolUsePolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Judge a text response from the oracle. `availability_checked`
    /// says whether `check_availability` ran in this turn-cycle;
    /// `attempts` counts oracle invocations so far.
    pub fn evaluate_text(
        &self,
        text: &str,
        availability_checked: bool,
        attempts: u32,
    ) -> PolicyDecision {
        if availability_checked || !claims_availability(text) {
            return PolicyDecision::Allow;
        }

        if attempts <= self.max_retries {
            PolicyDecision::Retry { reason: "availability_claim_without_tool" }
        } else {
            PolicyDecision::Degrade {
                reason: "tool_retries_exhausted",
                user_message: MANUAL_CONTACT_REPLY.to_string(),
            }
        }
    }
}

fn claims_availability(text: &str) -> bool {
    let lowered = text.to_lowercase();
    CLAIM_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::{PolicyDecision, ToolUsePolicy};

    #[test]
    fn ungrounded_availability_claim_is_rejected() {
        let policy = ToolUsePolicy::default();
        let decision = policy.evaluate_text("Seveda, miza je prosta!", false, 1);
        assert_eq!(decision, PolicyDecision::Retry { reason: "availability_claim_without_tool" });
    }

    #[test]
    fn grounded_claim_is_allowed() {
        let policy = ToolUsePolicy::default();
        let decision = policy.evaluate_text("Miza je prosta 10.10. ob 13:00.", true, 1);
        assert_eq!(decision, PolicyDecision::Allow);
    }

    #[test]
    fn neutral_text_is_allowed_without_the_tool() {
        let policy = ToolUsePolicy::default();
        let decision =
            policy.evaluate_text("Za kateri datum bi želeli rezervacijo?", false, 1);
        assert_eq!(decision, PolicyDecision::Allow);
    }

    #[test]
    fn repeated_ungrounded_claims_degrade_to_manual_contact() {
        let policy = ToolUsePolicy::default();
        let decision = policy.evaluate_text("Vse je prosto, kar pridite!", false, 3);
        match decision {
            PolicyDecision::Degrade { user_message, .. } => {
                assert!(user_message.contains("02 700 12 34"));
            }
            other => panic!("expected Degrade, got {other:?}"),
        }
    }
}
