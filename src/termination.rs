//! Termination evaluation.
//!
//! After every appended turn the session asks the evaluator whether the
//! conversation continues. Two signals are recognised, checked in this
//! order on the latest turn:
//!
//! 1. A **user** turn containing the approval token (case-insensitive) ends
//!    the session. Nothing else is looked at.
//! 2. A **reviewer** turn containing the readiness marker (case-insensitive)
//!    caches the artifact fenced in that turn, if any. The conversation
//!    continues either way.
//!
//! Both checks are plain substring matches over generated text. A user
//! typing "not approved" will end the session; roles saying "approved" never
//! will, because only user turns are checked for the token.

use tracing::{debug, info};

use crate::extract::ArtifactExtractor;
use crate::roles::Roster;
use crate::transcript::{Speaker, Transcript};

pub const DEFAULT_APPROVAL_TOKEN: &str = "APPROVED";
pub const DEFAULT_READINESS_MARKER: &str = "READY FOR USER APPROVAL";

/// Outcome of evaluating the latest turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    TerminateApproved,
}

/// Per-session termination flags. Owned by the session, mutated only by
/// [`TerminationEvaluator::evaluate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminationState {
    approved: bool,
    extracted_artifact: Option<String>,
}

impl TerminationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_approved(&self) -> bool {
        self.approved
    }

    /// Latest artifact offered by the reviewer, if any.
    pub fn extracted_artifact(&self) -> Option<&str> {
        self.extracted_artifact.as_deref()
    }
}

/// Decides, turn by turn, whether the conversation continues.
#[derive(Debug, Clone)]
pub struct TerminationEvaluator {
    approval_token: String,
    readiness_marker: String,
    extractor: ArtifactExtractor,
}

impl TerminationEvaluator {
    pub fn new(approval_token: &str, readiness_marker: &str, extractor: ArtifactExtractor) -> Self {
        Self {
            approval_token: approval_token.to_uppercase(),
            readiness_marker: readiness_marker.to_uppercase(),
            extractor,
        }
    }

    pub fn approval_token(&self) -> &str {
        &self.approval_token
    }

    pub fn readiness_marker(&self) -> &str {
        &self.readiness_marker
    }

    /// Inspect the latest turn of `transcript` and update `state`.
    pub fn evaluate(
        &self,
        state: &mut TerminationState,
        roster: &Roster,
        transcript: &Transcript,
    ) -> Verdict {
        if state.approved {
            return Verdict::TerminateApproved;
        }
        let Some(latest) = transcript.latest() else {
            return Verdict::Continue;
        };
        let upper = latest.body.to_uppercase();

        match &latest.speaker {
            Speaker::User if upper.contains(&self.approval_token) => {
                info!(
                    has_artifact = state.extracted_artifact.is_some(),
                    "User approved; terminating"
                );
                state.approved = true;
                Verdict::TerminateApproved
            }
            Speaker::Role(name)
                if roster.is_reviewer(name) && upper.contains(&self.readiness_marker) =>
            {
                match self.extractor.extract(&latest.body) {
                    Some(artifact) if !artifact.is_empty() => {
                        info!(
                            reviewer = %name,
                            bytes = artifact.len(),
                            "Reviewer marked ready; cached candidate artifact"
                        );
                        state.extracted_artifact = Some(artifact);
                    }
                    _ => {
                        debug!(
                            reviewer = %name,
                            tag = self.extractor.tag(),
                            "Reviewer marked ready without a fenced artifact"
                        );
                    }
                }
                Verdict::Continue
            }
            _ => Verdict::Continue,
        }
    }
}

impl Default for TerminationEvaluator {
    fn default() -> Self {
        Self::new(
            DEFAULT_APPROVAL_TOKEN,
            DEFAULT_READINESS_MARKER,
            ArtifactExtractor::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{BUSINESS_ANALYST, PRODUCT_OWNER, SOFTWARE_ENGINEER};
    use crate::transcript::Turn;

    fn run(
        evaluator: &TerminationEvaluator,
        state: &mut TerminationState,
        transcript: &mut Transcript,
        turn: Turn,
    ) -> Verdict {
        transcript.push(turn);
        evaluator.evaluate(state, &Roster::default(), transcript)
    }

    #[test]
    fn test_reviewer_ready_caches_artifact_and_continues() {
        let evaluator = TerminationEvaluator::default();
        let mut state = TerminationState::new();
        let mut transcript = Transcript::new();

        assert_eq!(
            run(&evaluator, &mut state, &mut transcript, Turn::user("build a calculator")),
            Verdict::Continue
        );
        let verdict = run(
            &evaluator,
            &mut state,
            &mut transcript,
            Turn::role(
                PRODUCT_OWNER,
                "All good. READY FOR USER APPROVAL ```html<div>calc</div>```",
            ),
        );
        assert_eq!(verdict, Verdict::Continue);
        assert_eq!(state.extracted_artifact(), Some("<div>calc</div>"));
        assert!(!state.is_approved());
    }

    #[test]
    fn test_user_approval_terminates_with_cached_artifact() {
        let evaluator = TerminationEvaluator::default();
        let mut state = TerminationState::new();
        let mut transcript = Transcript::new();
        run(
            &evaluator,
            &mut state,
            &mut transcript,
            Turn::role(PRODUCT_OWNER, "ready for user approval\n```html\n<p>v1</p>\n```"),
        );

        let verdict = run(&evaluator, &mut state, &mut transcript, Turn::user("approved"));
        assert_eq!(verdict, Verdict::TerminateApproved);
        assert!(state.is_approved());
        assert_eq!(state.extracted_artifact(), Some("<p>v1</p>"));
    }

    #[test]
    fn test_user_approval_without_artifact_still_terminates() {
        let evaluator = TerminationEvaluator::default();
        let mut state = TerminationState::new();
        let mut transcript = Transcript::new();

        let verdict = run(&evaluator, &mut state, &mut transcript, Turn::user("APPROVED"));
        assert_eq!(verdict, Verdict::TerminateApproved);
        assert!(state.is_approved());
        assert_eq!(state.extracted_artifact(), None);
    }

    #[test]
    fn test_approval_token_matches_as_substring() {
        let evaluator = TerminationEvaluator::default();
        let mut state = TerminationState::new();
        let mut transcript = Transcript::new();
        let verdict = run(
            &evaluator,
            &mut state,
            &mut transcript,
            Turn::user("Looks great, Approved!"),
        );
        assert_eq!(verdict, Verdict::TerminateApproved);
    }

    #[test]
    fn test_role_saying_approved_does_not_terminate() {
        let evaluator = TerminationEvaluator::default();
        let mut state = TerminationState::new();
        let mut transcript = Transcript::new();
        for name in [BUSINESS_ANALYST, SOFTWARE_ENGINEER, PRODUCT_OWNER] {
            let verdict = run(
                &evaluator,
                &mut state,
                &mut transcript,
                Turn::role(name, "The plan was approved by the customer."),
            );
            assert_eq!(verdict, Verdict::Continue);
        }
        assert!(!state.is_approved());
    }

    #[test]
    fn test_ready_without_fence_keeps_previous_artifact() {
        let evaluator = TerminationEvaluator::default();
        let mut state = TerminationState::new();
        let mut transcript = Transcript::new();
        run(
            &evaluator,
            &mut state,
            &mut transcript,
            Turn::role(PRODUCT_OWNER, "READY FOR USER APPROVAL ```html<p>old</p>```"),
        );
        let verdict = run(
            &evaluator,
            &mut state,
            &mut transcript,
            Turn::role(PRODUCT_OWNER, "Still READY FOR USER APPROVAL, see above."),
        );
        assert_eq!(verdict, Verdict::Continue);
        assert_eq!(state.extracted_artifact(), Some("<p>old</p>"));
    }

    #[test]
    fn test_ready_with_empty_fence_keeps_previous_artifact() {
        let evaluator = TerminationEvaluator::default();
        let mut state = TerminationState::new();
        let mut transcript = Transcript::new();
        run(
            &evaluator,
            &mut state,
            &mut transcript,
            Turn::role(PRODUCT_OWNER, "READY FOR USER APPROVAL ```html<p>old</p>```"),
        );
        run(
            &evaluator,
            &mut state,
            &mut transcript,
            Turn::role(PRODUCT_OWNER, "READY FOR USER APPROVAL ```html\n```"),
        );
        assert_eq!(state.extracted_artifact(), Some("<p>old</p>"));
    }

    #[test]
    fn test_newer_extraction_overwrites_older() {
        let evaluator = TerminationEvaluator::default();
        let mut state = TerminationState::new();
        let mut transcript = Transcript::new();
        run(
            &evaluator,
            &mut state,
            &mut transcript,
            Turn::role(PRODUCT_OWNER, "READY FOR USER APPROVAL ```html<p>v1</p>```"),
        );
        run(
            &evaluator,
            &mut state,
            &mut transcript,
            Turn::role(PRODUCT_OWNER, "Fixed it. READY FOR USER APPROVAL ```html<p>v2</p>```"),
        );
        assert_eq!(state.extracted_artifact(), Some("<p>v2</p>"));
    }

    #[test]
    fn test_non_reviewer_ready_is_ignored() {
        let evaluator = TerminationEvaluator::default();
        let mut state = TerminationState::new();
        let mut transcript = Transcript::new();
        run(
            &evaluator,
            &mut state,
            &mut transcript,
            Turn::role(
                SOFTWARE_ENGINEER,
                "READY FOR USER APPROVAL ```html<p>engineer</p>```",
            ),
        );
        assert_eq!(state.extracted_artifact(), None);
    }

    #[test]
    fn test_user_turn_with_marker_and_fence_is_not_extracted() {
        let evaluator = TerminationEvaluator::default();
        let mut state = TerminationState::new();
        let mut transcript = Transcript::new();
        let verdict = run(
            &evaluator,
            &mut state,
            &mut transcript,
            Turn::user("READY FOR USER APPROVAL? ```html<p>mine</p>```"),
        );
        assert_eq!(verdict, Verdict::Continue);
        assert_eq!(state.extracted_artifact(), None);
    }

    #[test]
    fn test_evaluate_only_inspects_latest_turn() {
        let evaluator = TerminationEvaluator::default();
        let mut state = TerminationState::new();
        let mut transcript = Transcript::new();
        transcript.push(Turn::user("approved"));
        transcript.push(Turn::role(BUSINESS_ANALYST, "noted"));
        let verdict = evaluator.evaluate(&mut state, &Roster::default(), &transcript);
        assert_eq!(verdict, Verdict::Continue);
    }

    #[test]
    fn test_empty_transcript_continues() {
        let evaluator = TerminationEvaluator::default();
        let mut state = TerminationState::new();
        let verdict = evaluator.evaluate(&mut state, &Roster::default(), &Transcript::new());
        assert_eq!(verdict, Verdict::Continue);
        assert_eq!(state, TerminationState::new());
    }

    #[test]
    fn test_approved_state_is_sticky() {
        let evaluator = TerminationEvaluator::default();
        let mut state = TerminationState::new();
        let mut transcript = Transcript::new();
        run(&evaluator, &mut state, &mut transcript, Turn::user("approved"));
        let verdict = run(
            &evaluator,
            &mut state,
            &mut transcript,
            Turn::role(BUSINESS_ANALYST, "anything"),
        );
        assert_eq!(verdict, Verdict::TerminateApproved);
    }

    #[test]
    fn test_custom_tokens_are_case_insensitive() {
        let evaluator = TerminationEvaluator::new("ship it", "done and dusted", ArtifactExtractor::default());
        assert_eq!(evaluator.approval_token(), "SHIP IT");
        let mut state = TerminationState::new();
        let mut transcript = Transcript::new();
        run(
            &evaluator,
            &mut state,
            &mut transcript,
            Turn::role(PRODUCT_OWNER, "Done And Dusted ```html<i>x</i>```"),
        );
        assert_eq!(state.extracted_artifact(), Some("<i>x</i>"));
        let verdict = run(&evaluator, &mut state, &mut transcript, Turn::user("Ship It"));
        assert_eq!(verdict, Verdict::TerminateApproved);
    }
}
