use async_trait::async_trait;

use crate::transcript::Message;

/// Why a responder produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityFault {
    #[error("responder invocation failed: {0}")]
    Invocation(String),
    #[error("responder returned an empty reply")]
    Empty,
}

/// Opaque text-generation capability behind each role.
///
/// `prior` is a read-only, already bounded view of the transcript.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn invoke(&self, system_prompt: &str, prior: &[Message])
        -> Result<String, CapabilityFault>;
}
