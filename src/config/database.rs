//! Database configuration module for the registration service.
//!
//! This module handles the database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs. Composite unique indexes, which entity attributes cannot express,
//! are added afterwards; they are what actually enforces "one registration per
//! child" and "one assignment per teacher and section".

use crate::entities::{
    Allocation, Class, OtpCode, PriorRoster, Registration, Section, SectionTeacher, Session,
    SystemState, Teacher, registration, section_teacher,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use std::path::Path;
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/vbs.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes the single connection handle used by the whole process.
///
/// The handle is created once at start-up and passed explicitly to every
/// operation; there is no global connection.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    if let Some(dir) = sqlite_parent_dir(&database_url) {
        std::fs::create_dir_all(dir)?;
    }
    debug!("Connecting to database at {database_url}");
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Directory holding a file-backed `SQLite` database, if the URL names one.
fn sqlite_parent_dir(database_url: &str) -> Option<&Path> {
    let path = database_url.strip_prefix("sqlite://")?;
    let path = path.split('?').next().unwrap_or(path);
    Path::new(path)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    db.execute(builder.build(schema.create_table_from_entity(entity).if_not_exists()))
        .await?;
    Ok(())
}

/// Creates all tables and unique indexes if they do not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table(db, &schema, Class).await?;
    create_table(db, &schema, Section).await?;
    create_table(db, &schema, Teacher).await?;
    create_table(db, &schema, SectionTeacher).await?;
    create_table(db, &schema, PriorRoster).await?;
    create_table(db, &schema, Registration).await?;
    create_table(db, &schema, Allocation).await?;
    create_table(db, &schema, SystemState).await?;
    create_table(db, &schema, OtpCode).await?;
    create_table(db, &schema, Session).await?;

    let child_identity = Index::create()
        .name("idx_registrations_first_name_dob")
        .table(Registration)
        .col(registration::Column::FirstName)
        .col(registration::Column::DateOfBirth)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&child_identity)).await?;

    let assignment_pair = Index::create()
        .name("idx_section_teachers_pair")
        .table(SectionTeacher)
        .col(section_teacher::Column::TeacherId)
        .col(section_teacher::Column::SectionId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&assignment_pair)).await?;

    info!("Database tables ensured");
    Ok(())
}
