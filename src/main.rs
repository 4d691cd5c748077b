use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vbs_registration::{
    api::{self, AppState},
    config::{self, database, env},
    core::auth::LoggingOtpDispatcher,
    errors::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables may also come from the environment
    dotenvy::dotenv().ok();

    // 3. Load the event configuration and apply environment overrides
    let mut app_config = config::event::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {e}"))?;
    env::apply_env_overrides(&mut app_config);
    info!(
        "Loaded configuration for {} ({} classes, {} teachers)",
        app_config.event.year,
        app_config.classes.len(),
        app_config.teachers.len()
    );

    // 4. Connect and make sure the schema exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    database::create_tables(&db).await?;

    // 5. Seed classes, sections and teachers from the config file
    config::event::seed_event(&db, &app_config)
        .await
        .inspect(|()| info!("Event data seeded"))
        .inspect_err(|e| error!("Failed to seed event data: {e}"))?;

    // 6. Serve the HTTP API
    let state = AppState::new(db, app_config, Arc::new(LoggingOtpDispatcher));
    api::serve(state, &env::get_bind_address()).await
}
