/// Database configuration and connection management
pub mod database;

/// Environment overrides (bind address, admin phones, CORS origins)
pub mod env;

/// Event configuration and seeding from config.toml
pub mod event;

pub use event::{AuthSettings, Config, EventSettings, HttpSettings};
