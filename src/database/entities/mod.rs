pub mod api_keys;
pub mod generations;
pub mod users;

pub use api_keys::{ApiKeyInfo, Entity as ApiKeys};
pub use generations::Entity as Generations;
pub use users::{Entity as Users, Plan};

// Type aliases
pub type ApiKeyRecord = api_keys::Model;
pub type UserRecord = users::Model;
pub type GenerationRecord = generations::Model;
