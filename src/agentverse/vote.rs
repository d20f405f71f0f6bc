//! Termination signals in free-text agent output.
//!
//! Experts end a horizontal round with `[CONSENSUS]` and reviewers approve a proposal with
//! `[APPROVED]`. Detection sits behind [`VoteExtractor`] so the decision stage does not
//! care whether the signal comes from a marker, structured output, or something else.
//!
//! [`TokenVoteExtractor`] is a plain substring check. A reply that omits the marker
//! counts as "no", even when the text is garbled or truncated; that makes a cut-off
//! reply look like dissent and can keep a discussion going to its round cap.

pub const CONSENSUS_TOKEN: &str = "[CONSENSUS]";
pub const APPROVAL_TOKEN: &str = "[APPROVED]";

pub trait VoteExtractor: Send + Sync {
    /// Did this horizontal-round response agree that the discussion is settled?
    fn consensus(&self, response: &str) -> bool;

    /// Did this reviewer accept the proposal?
    fn approval(&self, critique: &str) -> bool;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TokenVoteExtractor;

impl VoteExtractor for TokenVoteExtractor {
    fn consensus(&self, response: &str) -> bool {
        response.contains(CONSENSUS_TOKEN)
    }

    fn approval(&self, critique: &str) -> bool {
        critique.contains(APPROVAL_TOKEN)
    }
}
