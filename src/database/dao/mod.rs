pub mod api_keys;
pub mod generations;
pub mod users;

pub use api_keys::ApiKeysDao;
pub use generations::GenerationsDao;
pub use users::UsersDao;
