use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub agents: AgentsConfig,
    pub providers: ProvidersConfig,
    pub dialogue: DialogueConfig,
    /// Per-role system prompt overrides keyed by role name ("arbiter", "elenchus", ...).
    pub prompts: HashMap<String, String>,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentsConfig {
    pub defaults: AgentDefaults,
    /// Models keyed by role name. Must contain at least a "default" entry;
    /// roles without their own entry share it.
    pub models: HashMap<String, ModelRef>,
}

/// Reference to a provider + model combination for a role.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ModelRef {
    pub provider: String,
    pub model: String,
    /// Overrides the role's built-in sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentDefaults {
    pub max_tokens: u32,
    /// When set, every role samples at this temperature instead of its own.
    pub temperature: Option<f32>,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    pub ollama: Option<ProviderConfig>,
    pub openai: Option<ProviderConfig>,
    pub anthropic: Option<ProviderConfig>,
    pub groq: Option<ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
}

/// Content role used when the arbiter's answer names no known role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DefaultContentRole {
    #[serde(alias = "elenchus")]
    Challenger,
    #[serde(alias = "aporia")]
    Provocateur,
    #[default]
    #[serde(alias = "maieutics")]
    Guide,
}

/// How message sizes are measured against `contextBudget`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SizeEstimate {
    /// `cl100k_base` token count.
    #[default]
    Tokenizer,
    /// One unit per four characters.
    Chars,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DialogueConfig {
    pub mastery_threshold: f64,
    /// Estimated-token budget for the history shown to each responder.
    pub context_budget: i64,
    pub size_estimate: SizeEstimate,
    pub max_steps: u32,
    pub default_content_role: DefaultContentRole,
    /// Carry mastery score and step count from one user turn to the next.
    pub persist_across_turns: bool,
    /// End the turn when the evaluator loops back instead of re-entering the arbiter.
    pub yield_on_loop: bool,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            mastery_threshold: 0.9,
            context_budget: 4096,
            size_estimate: SizeEstimate::Tokenizer,
            max_steps: 12,
            default_content_role: DefaultContentRole::Guide,
            persist_across_turns: false,
            yield_on_loop: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "~/.socratic/message_history.json".into(),
        }
    }
}
