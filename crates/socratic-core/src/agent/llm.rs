use std::sync::Arc;

use async_trait::async_trait;
#[allow(deprecated)]
use rig::client::completion::CompletionModelHandle;
use rig::completion::{CompletionModel, CompletionRequest, Message as RigMessage};
use rig::message::{AssistantContent, Text, UserContent};
use rig::OneOrMany;
use tracing::debug;

use crate::agent::model_pool::ModelPool;
use crate::agent::responder::{CapabilityFault, Responder};
use crate::agent::role::{Role, RoleTable, RoleTableError};
use crate::transcript::{Message, Origin};

/// Nudge appended when the bounded view ends on an agent message, since most
/// chat endpoints expect the last turn to come from the user.
const CONTINUE_PROMPT: &str = "Continue.";

/// Responder backed by a rig completion model.
#[allow(deprecated)]
pub struct RigResponder {
    model: CompletionModelHandle<'static>,
    model_name: String,
    temperature: f64,
    max_tokens: u64,
}

#[allow(deprecated)]
impl RigResponder {
    pub fn new(
        model: CompletionModelHandle<'static>,
        model_name: impl Into<String>,
        temperature: f64,
        max_tokens: u64,
    ) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            temperature,
            max_tokens,
        }
    }
}

#[async_trait]
impl Responder for RigResponder {
    async fn invoke(
        &self,
        system_prompt: &str,
        prior: &[Message],
    ) -> Result<String, CapabilityFault> {
        let chat_history = to_chat_history(prior);
        debug!(
            "LLM request [{}]: {} messages, temp={}",
            self.model_name,
            chat_history.len(),
            self.temperature
        );

        let request = CompletionRequest {
            preamble: Some(system_prompt.to_string()),
            chat_history: OneOrMany::many(chat_history)
                .map_err(|e| CapabilityFault::Invocation(format!("empty chat history: {e}")))?,
            documents: Vec::new(),
            tools: Vec::new(),
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            tool_choice: None,
            additional_params: None,
        };

        let llm_start = std::time::Instant::now();
        let response = self
            .model
            .completion(request)
            .await
            .map_err(|e| CapabilityFault::Invocation(e.to_string()))?;

        let text: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(t) => Some(t.text.clone()),
                _ => None,
            })
            .collect();
        debug!(
            "LLM response [{}]: {} chars in {:.1}s",
            self.model_name,
            text.len(),
            llm_start.elapsed().as_secs_f64()
        );

        if text.trim().is_empty() {
            return Err(CapabilityFault::Empty);
        }
        Ok(text)
    }
}

/// Convert a bounded transcript view into rig chat history. Never empty and
/// always ends on a user message.
fn to_chat_history(prior: &[Message]) -> Vec<RigMessage> {
    let mut history: Vec<RigMessage> = prior
        .iter()
        .map(|m| match m.origin {
            Origin::User => user_message(&m.content),
            Origin::Agent => RigMessage::Assistant {
                id: None,
                content: OneOrMany::one(AssistantContent::Text(Text {
                    text: m.content.clone(),
                })),
            },
        })
        .collect();

    if prior.last().map(|m| m.origin) != Some(Origin::User) {
        history.push(user_message(CONTINUE_PROMPT));
    }
    history
}

fn user_message(text: &str) -> RigMessage {
    RigMessage::User {
        content: OneOrMany::one(UserContent::Text(Text {
            text: text.to_string(),
        })),
    }
}

/// Build a role table with one rig responder per role from the model pool.
///
/// `temperature_override` replaces every role's temperature; otherwise a
/// model entry's own temperature wins over the role's built-in one.
pub fn role_table_from_pool(
    pool: &ModelPool,
    max_tokens: u64,
    temperature_override: Option<f64>,
    prompts: impl IntoIterator<Item = (Role, String)>,
) -> Result<RoleTable, RoleTableError> {
    let mut builder = RoleTable::builder();
    for role in Role::ALL {
        let entry = pool.for_role(role);
        let temperature = temperature_override
            .or(entry.temperature)
            .unwrap_or_else(|| role.default_temperature());
        let responder = RigResponder::new(
            entry.handle.clone(),
            entry.name.clone(),
            temperature,
            max_tokens,
        );
        builder = builder.responder(role, Arc::new(responder));
    }
    for (role, prompt) in prompts {
        builder = builder.prompt(role, prompt);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_view_becomes_single_user_turn() {
        let history = to_chat_history(&[]);
        assert_eq!(history.len(), 1);
        assert!(matches!(history[0], RigMessage::User { .. }));
    }

    #[test]
    fn test_trailing_agent_message_gets_continue_nudge() {
        let prior = vec![Message::user("is justice useful?"), Message::agent("to whom?")];
        let history = to_chat_history(&prior);
        assert_eq!(history.len(), 3);
        assert!(matches!(history[1], RigMessage::Assistant { .. }));
        assert!(matches!(history[2], RigMessage::User { .. }));
    }

    #[test]
    fn test_trailing_user_message_is_sent_as_is() {
        let prior = vec![Message::agent("well?"), Message::user("I'm not sure")];
        let history = to_chat_history(&prior);
        assert_eq!(history.len(), 2);
        assert!(matches!(history[1], RigMessage::User { .. }));
    }
}
