use crate::agent::role::Role;
use crate::dialogue::select::Selection;
use crate::transcript::{Message, Transcript};

/// Mutable context threaded through one routing cycle.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub transcript: Transcript,
    /// Role that ran last; `None` before the first step of a cycle.
    pub active_role: Option<Role>,
    /// Raw selector output steering the next transition.
    pub route_hint: Option<String>,
    pub mastery_score: f64,
    pub mastery_threshold: f64,
    pub step_count: u32,
    /// Evaluator's explanation of the last score, if it gave one.
    pub feedback: Option<String>,
    /// How the last selector output was resolved.
    pub selection: Option<Selection>,
    /// The last role execution ended in a capability fault.
    pub faulted: bool,
}

impl SessionState {
    pub fn new(transcript: Transcript, mastery_score: f64, mastery_threshold: f64) -> Self {
        Self {
            transcript,
            active_role: None,
            route_hint: None,
            mastery_score: clamp_unit(mastery_score),
            mastery_threshold,
            step_count: 0,
            feedback: None,
            selection: None,
            faulted: false,
        }
    }

    pub fn mastered(&self) -> bool {
        self.mastery_score >= self.mastery_threshold
    }

    /// The only way agent dialogue enters the transcript.
    pub fn append_agent(&mut self, content: impl Into<String>) {
        self.transcript.append(Message::agent(content));
    }

    pub fn set_score(&mut self, score: f64) {
        self.mastery_score = clamp_unit(score);
    }

    /// Forget per-cycle routing data so the next route starts at the selector.
    pub fn restart_cycle(&mut self) {
        self.active_role = None;
        self.route_hint = None;
        self.selection = None;
        self.faulted = false;
    }
}

fn clamp_unit(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_are_clamped() {
        let mut state = SessionState::new(Transcript::new(), 1.7, 0.9);
        assert_eq!(state.mastery_score, 1.0);
        state.set_score(-3.0);
        assert_eq!(state.mastery_score, 0.0);
        state.set_score(f64::NAN);
        assert_eq!(state.mastery_score, 0.0);
    }

    #[test]
    fn test_mastered_is_inclusive() {
        let state = SessionState::new(Transcript::new(), 0.9, 0.9);
        assert!(state.mastered());
        let state = SessionState::new(Transcript::new(), 0.89, 0.9);
        assert!(!state.mastered());
    }

    #[test]
    fn test_append_agent_adds_newest_message() {
        let mut state = SessionState::new(Transcript::from(vec![Message::user("hi")]), 0.0, 0.9);
        state.append_agent("hello, what shall we examine?");
        assert_eq!(state.transcript.len(), 2);
        assert_eq!(
            state.transcript.last(),
            Some(&Message::agent("hello, what shall we examine?"))
        );
    }
}
