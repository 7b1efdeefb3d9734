pub mod auth;
pub mod billing;
pub mod commands;
pub mod completion;
pub mod config;
pub mod database;
pub mod entitlement;
pub mod error;
pub mod generation;
pub mod health;
pub mod jobs;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod test_utils;

pub use config::Config;
pub use server::Server;
