pub mod llm;
pub mod model_pool;
pub mod responder;
pub mod role;

pub use llm::{role_table_from_pool, RigResponder};
pub use model_pool::{ModelEntry, ModelPool};
pub use responder::{CapabilityFault, Responder};
pub use role::{ContentRole, Role, RoleSpec, RoleTable, RoleTableBuilder, RoleTableError};
