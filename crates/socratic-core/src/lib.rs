pub mod agent;
pub mod dialogue;
pub mod history;
pub mod transcript;

// Re-export key types
pub use agent::{ContentRole, Responder, Role, RoleTable};
pub use dialogue::{DialogueLoop, DialogueSettings, TurnEvent, TutorSession};
pub use history::{HistoryStore, TranscriptStore};
pub use transcript::{Message, Origin, Transcript};
