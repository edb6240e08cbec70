pub mod context;
pub mod r#loop;
pub mod router;
pub mod score;
pub mod select;
pub mod state;

pub use context::{BoundedView, CharEstimator, ContextBounder, SizeEstimator, TokenizerEstimator};
pub use r#loop::{DiagnosticKind, DialogueLoop, DialogueSettings, TurnEvent, TurnOutcome, TutorSession};
pub use router::{Next, Router, Termination};
pub use score::{EvaluatorVerdict, ScoreParser};
pub use select::{MatchTier, RoleSelector, Selection};
pub use state::SessionState;
