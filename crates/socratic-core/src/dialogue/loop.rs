use std::fmt;

use socratic_config::DialogueConfig;
use tracing::{debug, info, warn};

use crate::agent::responder::CapabilityFault;
use crate::agent::role::{ContentRole, Role, RoleTable};
use crate::dialogue::context::ContextBounder;
use crate::dialogue::router::{Next, Router, Termination};
use crate::dialogue::score::ScoreParser;
use crate::dialogue::select::{MatchTier, RoleSelector};
use crate::dialogue::state::SessionState;
use crate::transcript::{Message, Transcript};

/// Knobs for one dialogue engine.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueSettings {
    pub mastery_threshold: f64,
    pub context_budget: i64,
    pub max_steps: u32,
    pub default_content_role: ContentRole,
    pub persist_across_turns: bool,
    pub yield_on_loop: bool,
}

impl Default for DialogueSettings {
    fn default() -> Self {
        Self::from(&DialogueConfig::default())
    }
}

impl From<&DialogueConfig> for DialogueSettings {
    fn from(config: &DialogueConfig) -> Self {
        Self {
            mastery_threshold: config.mastery_threshold,
            context_budget: config.context_budget,
            max_steps: config.max_steps,
            default_content_role: config.default_content_role.into(),
            persist_across_turns: config.persist_across_turns,
            yield_on_loop: config.yield_on_loop,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Selector or evaluator output had to be replaced by a default.
    ParseFallback,
    /// A responder failed or replied with nothing.
    CapabilityFault,
    /// The step budget ran out.
    LoopGuardTrip,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::ParseFallback => f.write_str("parse fallback"),
            DiagnosticKind::CapabilityFault => f.write_str("capability fault"),
            DiagnosticKind::LoopGuardTrip => f.write_str("loop guard"),
        }
    }
}

/// Everything a caller can observe during a turn, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    RoleOutput {
        role: ContentRole,
        text: String,
    },
    ScoreUpdate {
        score: f64,
        feedback: Option<String>,
    },
    /// Evaluator scored below the threshold; routing returns to the selector.
    LoopBack {
        step_count: u32,
    },
    /// Informational only.
    Diagnostic {
        kind: DiagnosticKind,
        note: String,
    },
    SessionDone {
        final_score: f64,
        reason: Termination,
    },
}

/// Result of `DialogueLoop::begin_turn`.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub events: Vec<TurnEvent>,
    pub state: SessionState,
}

impl TurnOutcome {
    pub fn is_done(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, TurnEvent::SessionDone { .. }))
    }
}

/// Runs routing cycles: asks the router for the next role, executes it, and
/// merges the reply into the session state.
///
/// Roles execute strictly one after another. No fault escapes a turn.
pub struct DialogueLoop {
    roles: RoleTable,
    router: Router,
    bounder: ContextBounder,
    scores: ScoreParser,
    settings: DialogueSettings,
}

impl DialogueLoop {
    pub fn new(roles: RoleTable, settings: DialogueSettings) -> Self {
        let selector = RoleSelector::new(settings.default_content_role);
        Self {
            roles,
            router: Router::new(selector, settings.max_steps),
            bounder: ContextBounder::default(),
            scores: ScoreParser::new(),
            settings,
        }
    }

    /// Replace the size estimator used for the context budget.
    pub fn with_bounder(mut self, bounder: ContextBounder) -> Self {
        self.bounder = bounder;
        self
    }

    /// Replace the selector candidate table.
    pub fn with_selector(mut self, selector: RoleSelector) -> Self {
        self.router = Router::new(selector, self.settings.max_steps);
        self
    }

    pub fn settings(&self) -> &DialogueSettings {
        &self.settings
    }

    /// Append the user's message to `prior` and run a full turn from a fresh
    /// state.
    pub async fn begin_turn(
        &self,
        user_text: &str,
        prior: Transcript,
        mastery_score: f64,
        mastery_threshold: f64,
    ) -> TurnOutcome {
        let mut transcript = prior;
        transcript.append(Message::user(user_text));
        let state = SessionState::new(transcript, mastery_score, mastery_threshold);
        let (events, state) = self.run(state).await;
        TurnOutcome { events, state }
    }

    /// Route and execute until the session terminates, or until the first
    /// loop-back when `yield_on_loop` is set.
    pub async fn run(&self, mut state: SessionState) -> (Vec<TurnEvent>, SessionState) {
        let mut events = Vec::new();

        loop {
            let (next, routed) = self.router.route(state);
            state = routed;

            match next {
                Next::Run(role) => {
                    if let (Some(content), Some(selection)) = (role.as_content(), state.selection)
                    {
                        if selection.tier == MatchTier::Fallback {
                            events.push(TurnEvent::Diagnostic {
                                kind: DiagnosticKind::ParseFallback,
                                note: format!(
                                    "selector output {:?} named no known role; using '{content}'",
                                    state.route_hint.as_deref().unwrap_or("")
                                ),
                            });
                        }
                    }
                    self.execute(role, &mut state, &mut events).await;
                }
                Next::Loop => {
                    debug!(
                        "Score {:.2} below threshold {:.2}, looping back",
                        state.mastery_score, state.mastery_threshold
                    );
                    events.push(TurnEvent::LoopBack {
                        step_count: state.step_count,
                    });
                    state.restart_cycle();
                    if self.settings.yield_on_loop {
                        break;
                    }
                }
                Next::Terminal(reason) => {
                    if reason == Termination::LoopGuard {
                        events.push(TurnEvent::Diagnostic {
                            kind: DiagnosticKind::LoopGuardTrip,
                            note: format!(
                                "stopped after {} steps with mastery score {:.2}",
                                state.step_count, state.mastery_score
                            ),
                        });
                    }
                    info!(
                        "Session done ({reason}) after {} steps, score {:.2}",
                        state.step_count, state.mastery_score
                    );
                    events.push(TurnEvent::SessionDone {
                        final_score: state.mastery_score,
                        reason,
                    });
                    break;
                }
            }
        }

        (events, state)
    }

    /// Invoke one role's responder on the bounded transcript and merge its
    /// reply. Counts as one step whatever the outcome.
    async fn execute(&self, role: Role, state: &mut SessionState, events: &mut Vec<TurnEvent>) {
        let spec = self.roles.get(role);
        let view = self
            .bounder
            .bound(state.transcript.messages(), self.settings.context_budget);

        let reply = spec
            .responder
            .invoke(&spec.prompt, view)
            .await
            .and_then(|text| {
                if text.trim().is_empty() {
                    Err(CapabilityFault::Empty)
                } else {
                    Ok(text)
                }
            });
        state.step_count += 1;

        match reply {
            Ok(text) => {
                state.faulted = false;
                self.merge(role, text, state, events);
            }
            Err(fault) => {
                warn!("Role '{role}' failed at step {}: {fault}", state.step_count);
                state.faulted = true;
                if role == Role::Selector {
                    state.route_hint = None;
                }
                events.push(TurnEvent::Diagnostic {
                    kind: DiagnosticKind::CapabilityFault,
                    note: format!("{role}: {fault}"),
                });
            }
        }
    }

    fn merge(&self, role: Role, text: String, state: &mut SessionState, events: &mut Vec<TurnEvent>) {
        match role {
            Role::Selector => {
                state.route_hint = Some(text.trim().to_string());
            }
            Role::Evaluator => {
                match self.scores.parse(&text) {
                    Some(verdict) => {
                        state.set_score(verdict.score);
                        state.feedback = verdict.feedback;
                    }
                    None => {
                        warn!("Evaluator reply had no score, using 0.0: {text:?}");
                        state.set_score(0.0);
                        state.feedback = None;
                        events.push(TurnEvent::Diagnostic {
                            kind: DiagnosticKind::ParseFallback,
                            note: "evaluator reply carried no score; using 0.0".into(),
                        });
                    }
                }
                events.push(TurnEvent::ScoreUpdate {
                    score: state.mastery_score,
                    feedback: state.feedback.clone(),
                });
            }
            Role::Challenger | Role::Provocateur | Role::Guide => {
                let text = text.trim().to_string();
                state.append_agent(text.clone());
                if let Some(content) = role.as_content() {
                    events.push(TurnEvent::RoleOutput {
                        role: content,
                        text,
                    });
                }
            }
        }
    }
}

/// A conversation across many user turns.
///
/// Owns the transcript between turns. With `persist_across_turns` the mastery
/// score and step count carry from turn to turn until a session terminates;
/// otherwise every turn starts from zero.
pub struct TutorSession {
    dialogue: DialogueLoop,
    transcript: Transcript,
    /// Last reported score, kept for display.
    mastery_score: f64,
    /// Score and step count fed into the next turn.
    carried_score: f64,
    step_count: u32,
}

impl TutorSession {
    pub fn new(dialogue: DialogueLoop, prior: Transcript) -> Self {
        Self {
            dialogue,
            transcript: prior,
            mastery_score: 0.0,
            carried_score: 0.0,
            step_count: 0,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Score reported by the most recent evaluation.
    pub fn mastery_score(&self) -> f64 {
        self.mastery_score
    }

    pub fn settings(&self) -> &DialogueSettings {
        self.dialogue.settings()
    }

    pub async fn submit(&mut self, user_text: &str) -> Vec<TurnEvent> {
        let settings = self.dialogue.settings();
        let persist = settings.persist_across_turns;
        let carried_score = if persist { self.carried_score } else { 0.0 };

        let mut transcript = std::mem::take(&mut self.transcript);
        transcript.append(Message::user(user_text));
        let mut state = SessionState::new(transcript, carried_score, settings.mastery_threshold);
        if persist {
            state.step_count = self.step_count;
        }

        let (events, state) = self.dialogue.run(state).await;
        let done = events
            .iter()
            .any(|e| matches!(e, TurnEvent::SessionDone { .. }));

        self.transcript = state.transcript;
        self.mastery_score = state.mastery_score;
        if persist && !done {
            self.carried_score = state.mastery_score;
            self.step_count = state.step_count;
        } else {
            self.carried_score = 0.0;
            self.step_count = 0;
        }
        events
    }

    /// Drop the transcript and counters.
    pub fn reset(&mut self) {
        self.transcript = Transcript::new();
        self.mastery_score = 0.0;
        self.carried_score = 0.0;
        self.step_count = 0;
    }
}
