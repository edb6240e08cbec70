use std::collections::HashMap;

use anyhow::Result;
#[allow(deprecated)]
use rig::client::completion::CompletionModelHandle;

use crate::agent::role::Role;

/// A configured model: handle, name for logging, optional temperature override.
#[allow(deprecated)]
#[derive(Clone)]
pub struct ModelEntry {
    pub handle: CompletionModelHandle<'static>,
    pub name: String,
    pub temperature: Option<f64>,
}

/// Models keyed by role domain name ("arbiter", "elenchus", ...).
///
/// Roles without an entry fall back to "default", which is validated at
/// construction time.
#[derive(Clone)]
pub struct ModelPool {
    models: HashMap<String, ModelEntry>,
}

impl ModelPool {
    pub fn new(models: HashMap<String, ModelEntry>) -> Result<Self> {
        if !models.contains_key("default") {
            anyhow::bail!("model pool must contain a \"default\" entry");
        }
        Ok(Self { models })
    }

    /// Model for a role, falling back to "default".
    pub fn for_role(&self, role: Role) -> &ModelEntry {
        self.models
            .get(role.domain_name())
            .or_else(|| self.models.get(role.canonical_name()))
            .unwrap_or_else(|| &self.models["default"])
    }

    /// True when every role resolves to the same model entry.
    pub fn is_shared(&self) -> bool {
        self.models.len() == 1
    }
}
