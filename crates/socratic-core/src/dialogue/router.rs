//! Dialogue state machine.
//!
//! Decides which role runs next from the current session state. It never
//! calls a responder; executing roles and merging their output is the
//! dialogue loop's job.

use std::fmt;

use tracing::{debug, warn};

use crate::agent::role::Role;
use crate::dialogue::select::{MatchTier, RoleSelector};
use crate::dialogue::state::SessionState;

/// Why a session reached the terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Evaluator score met the threshold.
    Mastery,
    /// The step budget ran out.
    LoopGuard,
    /// The evaluator could not be reached; score left unchanged.
    EvaluatorFault,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Mastery => f.write_str("mastery reached"),
            Termination::LoopGuard => f.write_str("step limit reached"),
            Termination::EvaluatorFault => f.write_str("evaluator unavailable"),
        }
    }
}

/// Outcome of one routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// Execute this role.
    Run(Role),
    /// Cycle finished below the threshold; go back to the selector.
    Loop,
    Terminal(Termination),
}

pub struct Router {
    selector: RoleSelector,
    max_steps: u32,
}

impl Router {
    pub fn new(selector: RoleSelector, max_steps: u32) -> Self {
        Self {
            selector,
            max_steps,
        }
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    /// Compute the next transition. When a role is scheduled it becomes the
    /// state's `active_role`.
    pub fn route(&self, mut state: SessionState) -> (Next, SessionState) {
        let next = match state.active_role {
            None => Next::Run(Role::Selector),
            Some(Role::Selector) => {
                let hint = state.route_hint.as_deref().unwrap_or("");
                let selection = self.selector.select(hint);
                if selection.tier == MatchTier::Fallback {
                    warn!(
                        "Selector output not recognized, using default role '{}': {:?}",
                        selection.role, hint
                    );
                } else {
                    debug!("Selector chose '{}' ({:?})", selection.role, selection.tier);
                }
                state.selection = Some(selection);
                Next::Run(selection.role.into())
            }
            // Content roles need no routing signal; a faulted content call is
            // a no-op transition to the evaluator.
            Some(Role::Challenger | Role::Provocateur | Role::Guide) => Next::Run(Role::Evaluator),
            Some(Role::Evaluator) => {
                if state.faulted {
                    Next::Terminal(Termination::EvaluatorFault)
                } else if state.mastered() {
                    Next::Terminal(Termination::Mastery)
                } else {
                    Next::Loop
                }
            }
        };

        let next = match next {
            Next::Run(role) if state.step_count >= self.max_steps => {
                warn!(
                    "Loop guard: {} steps executed, refusing to run '{role}'",
                    state.step_count
                );
                Next::Terminal(Termination::LoopGuard)
            }
            Next::Run(role) => {
                state.active_role = Some(role);
                Next::Run(role)
            }
            other => other,
        };

        debug!("Route: step={} -> {next:?}", state.step_count);
        (next, state)
    }
}
