pub mod loader;
pub mod schema;

pub use loader::{
    apply_env_overrides, find_config_path, load_config, resolve_path, save_config,
    CONTEXT_BUDGET_ENV,
};
pub use schema::{
    AgentDefaults, AgentsConfig, Config, DefaultContentRole, DialogueConfig, HistoryConfig,
    ModelRef, ProviderConfig, ProvidersConfig, SizeEstimate,
};
