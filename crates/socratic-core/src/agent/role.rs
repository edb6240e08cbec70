use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use socratic_config::DefaultContentRole;

use crate::agent::responder::Responder;

/// The closed set of responders the router moves between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Arbiter: picks the next content role.
    Selector,
    /// Elenchus: cross-examines the learner's claims.
    Challenger,
    /// Aporia: provokes productive doubt.
    Provocateur,
    /// Maieutics: scaffolds the learner toward the answer.
    Guide,
    /// Dialectic: scores mastery.
    Evaluator,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Selector,
        Role::Challenger,
        Role::Provocateur,
        Role::Guide,
        Role::Evaluator,
    ];

    pub fn canonical_name(self) -> &'static str {
        match self {
            Role::Selector => "selector",
            Role::Challenger => "challenger",
            Role::Provocateur => "provocateur",
            Role::Guide => "guide",
            Role::Evaluator => "evaluator",
        }
    }

    pub fn domain_name(self) -> &'static str {
        match self {
            Role::Selector => "arbiter",
            Role::Challenger => "elenchus",
            Role::Provocateur => "aporia",
            Role::Guide => "maieutics",
            Role::Evaluator => "dialectic",
        }
    }

    /// Look a role up by either its canonical or its domain name.
    pub fn from_name(name: &str) -> Option<Role> {
        let name = name.trim().to_lowercase();
        Role::ALL
            .into_iter()
            .find(|r| r.canonical_name() == name || r.domain_name() == name)
    }

    pub fn as_content(self) -> Option<ContentRole> {
        match self {
            Role::Challenger => Some(ContentRole::Challenger),
            Role::Provocateur => Some(ContentRole::Provocateur),
            Role::Guide => Some(ContentRole::Guide),
            Role::Selector | Role::Evaluator => None,
        }
    }

    pub fn default_prompt(self) -> &'static str {
        match self {
            Role::Selector => {
                "Analyze the conversation and decide which teacher speaks next. \
                 Route to 'elenchus' if the user is overconfident, 'aporia' if they \
                 are complacent and need to feel why the topic is hard, or 'maieutics' \
                 if they need help. Reply with exactly one word: elenchus, aporia or maieutics."
            }
            Role::Challenger => {
                "Find logical contradictions in the user's statement. Be sharp and persistent."
            }
            Role::Provocateur => {
                "Create a sense of wonder and doubt. Use paradoxes to show why this topic is difficult."
            }
            Role::Guide => {
                "Use analogies to help the user discover the truth themselves. Do not give the answer."
            }
            Role::Evaluator => {
                "Evaluate the user's progress. Assign a mastery score from 0.0 to 1.0. \
                 Respond with ONLY a JSON object: {\"mastery_score\": <number>, \"feedback\": \"<one sentence>\"}"
            }
        }
    }

    /// Sampling temperature each role was tuned for: deterministic routing and
    /// scoring, looser for the roles that need creative analogies.
    pub fn default_temperature(self) -> f64 {
        match self {
            Role::Selector | Role::Evaluator => 0.0,
            Role::Challenger => 0.1,
            Role::Provocateur => 0.7,
            Role::Guide => 0.5,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.domain_name())
    }
}

/// Roles whose output is appended to the transcript as dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentRole {
    Challenger,
    Provocateur,
    Guide,
}

impl ContentRole {
    pub const ALL: [ContentRole; 3] = [
        ContentRole::Challenger,
        ContentRole::Provocateur,
        ContentRole::Guide,
    ];
}

impl From<ContentRole> for Role {
    fn from(role: ContentRole) -> Self {
        match role {
            ContentRole::Challenger => Role::Challenger,
            ContentRole::Provocateur => Role::Provocateur,
            ContentRole::Guide => Role::Guide,
        }
    }
}

impl From<DefaultContentRole> for ContentRole {
    fn from(role: DefaultContentRole) -> Self {
        match role {
            DefaultContentRole::Challenger => ContentRole::Challenger,
            DefaultContentRole::Provocateur => ContentRole::Provocateur,
            DefaultContentRole::Guide => ContentRole::Guide,
        }
    }
}

impl fmt::Display for ContentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Role::from(*self).fmt(f)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RoleTableError {
    #[error("no responder registered for role '{0}'")]
    MissingResponder(Role),
}

/// Prompt and responder bound to one role.
#[derive(Clone)]
pub struct RoleSpec {
    pub prompt: String,
    pub responder: Arc<dyn Responder>,
}

/// Every role's prompt and responder. Complete by construction.
#[derive(Clone)]
pub struct RoleTable {
    roles: HashMap<Role, RoleSpec>,
}

impl RoleTable {
    pub fn builder() -> RoleTableBuilder {
        RoleTableBuilder::default()
    }

    pub fn get(&self, role: Role) -> &RoleSpec {
        // `build` guarantees every role is present.
        &self.roles[&role]
    }
}

#[derive(Default)]
pub struct RoleTableBuilder {
    responders: HashMap<Role, Arc<dyn Responder>>,
    prompts: HashMap<Role, String>,
    fallback: Option<Arc<dyn Responder>>,
}

impl RoleTableBuilder {
    /// Responder for one role.
    pub fn responder(mut self, role: Role, responder: Arc<dyn Responder>) -> Self {
        self.responders.insert(role, responder);
        self
    }

    /// Responder used by every role without its own.
    pub fn shared_responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.fallback = Some(responder);
        self
    }

    /// Replace a role's built-in prompt.
    pub fn prompt(mut self, role: Role, prompt: impl Into<String>) -> Self {
        self.prompts.insert(role, prompt.into());
        self
    }

    pub fn build(mut self) -> Result<RoleTable, RoleTableError> {
        let mut roles = HashMap::new();
        for role in Role::ALL {
            let responder = self
                .responders
                .remove(&role)
                .or_else(|| self.fallback.clone())
                .ok_or(RoleTableError::MissingResponder(role))?;
            let prompt = self
                .prompts
                .remove(&role)
                .unwrap_or_else(|| role.default_prompt().to_string());
            roles.insert(role, RoleSpec { prompt, responder });
        }
        Ok(RoleTable { roles })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::responder::CapabilityFault;
    use crate::transcript::Message;

    struct Echo;

    #[async_trait::async_trait]
    impl Responder for Echo {
        async fn invoke(
            &self,
            system_prompt: &str,
            _prior: &[Message],
        ) -> Result<String, CapabilityFault> {
            Ok(system_prompt.to_string())
        }
    }

    #[test]
    fn test_names_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::from_name(role.canonical_name()), Some(role));
            assert_eq!(Role::from_name(role.domain_name()), Some(role));
        }
        assert_eq!(Role::from_name("  Elenchus "), Some(Role::Challenger));
        assert_eq!(Role::from_name("socrates"), None);
    }

    #[test]
    fn test_only_three_roles_are_content_roles() {
        let content: Vec<_> = Role::ALL.into_iter().filter_map(Role::as_content).collect();
        assert_eq!(content, ContentRole::ALL.to_vec());
    }

    #[test]
    fn test_build_requires_every_responder() {
        let err = RoleTable::builder()
            .responder(Role::Selector, Arc::new(Echo))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, RoleTableError::MissingResponder(_)));
    }

    #[test]
    fn test_shared_responder_fills_gaps_and_prompts_override() {
        let table = RoleTable::builder()
            .shared_responder(Arc::new(Echo))
            .prompt(Role::Guide, "be gentle")
            .build()
            .unwrap();
        assert_eq!(table.get(Role::Guide).prompt, "be gentle");
        assert_eq!(
            table.get(Role::Challenger).prompt,
            Role::Challenger.default_prompt()
        );
    }
}
