//! Event configuration loading from config.toml
//!
//! The TOML file describes one programme year: the acknowledgement prefix,
//! the auth settings, and the classes, sections and teachers used to seed the
//! database on first run. Seeding is idempotent so it can run on every start.

use crate::{
    entities::{Class, Section, Teacher, class, section, teacher},
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Programme-wide settings
    pub event: EventSettings,
    /// Sign-in settings
    #[serde(default)]
    pub auth: AuthSettings,
    /// HTTP server settings
    #[serde(default)]
    pub http: HttpSettings,
    /// Classes (with their sections) to seed
    #[serde(default)]
    pub classes: Vec<ClassConfig>,
    /// Teachers to seed
    #[serde(default)]
    pub teachers: Vec<TeacherConfig>,
}

/// Programme-wide settings
#[derive(Debug, Clone, Deserialize)]
pub struct EventSettings {
    /// Programme year, e.g. 2025
    pub year: i32,
    /// Prefix of every acknowledgement id, e.g. `"VBS2025"`
    pub acknowledgement_prefix: String,
    /// Whether a class/section is allocated as part of registration
    #[serde(default = "default_true")]
    pub allocate_on_register: bool,
}

/// Sign-in settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Phone numbers whose sessions carry the admin role claim
    #[serde(default)]
    pub admin_phones: Vec<String>,
    /// Minutes a one-time code stays valid
    #[serde(default = "default_otp_ttl")]
    pub otp_ttl_minutes: i64,
    /// Wrong guesses after which a code is discarded
    #[serde(default = "default_max_code_attempts")]
    pub max_code_attempts: i32,
    /// Hours a session stays valid
    #[serde(default = "default_session_ttl")]
    pub session_ttl_hours: i64,
}

/// HTTP server settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpSettings {
    /// Browser origins allowed by CORS; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            admin_phones: Vec::new(),
            otp_ttl_minutes: default_otp_ttl(),
            max_code_attempts: default_max_code_attempts(),
            session_ttl_hours: default_session_ttl(),
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_otp_ttl() -> i64 {
    10
}

const fn default_max_code_attempts() -> i32 {
    5
}

const fn default_session_ttl() -> i64 {
    12
}

/// Configuration for a single class
#[derive(Debug, Deserialize, Clone)]
pub struct ClassConfig {
    /// Class name
    pub name: String,
    /// Youngest eligible age, inclusive
    pub min_age: i32,
    /// Oldest eligible age, inclusive
    pub max_age: i32,
    /// Capacity across all sections
    pub max_capacity: i32,
    /// Sections of this class
    #[serde(default)]
    pub sections: Vec<SectionConfig>,
}

/// Configuration for a single section
#[derive(Debug, Deserialize, Clone)]
pub struct SectionConfig {
    /// Unique section code, e.g. `"BEGINNERS-A"`
    pub code: String,
    /// Label for rosters; defaults to the code
    pub display_name: Option<String>,
    /// Capacity of this section
    pub max_capacity: i32,
}

/// Configuration for a single teacher
#[derive(Debug, Deserialize, Clone)]
pub struct TeacherConfig {
    /// Display name
    pub name: String,
    /// Phone number in `+91XXXXXXXXXX` form
    pub phone: String,
}

/// Loads event configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    debug!("Loading configuration from {path_ref:?}");
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path_ref:?}: {e}"),
    })?;

    parse_config(&contents)
}

/// Parses and validates the configuration text.
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;

    for class in &config.classes {
        if class.min_age > class.max_age {
            return Err(Error::Config {
                message: format!(
                    "Class {} has min_age {} above max_age {}",
                    class.name, class.min_age, class.max_age
                ),
            });
        }
    }

    Ok(config)
}

/// Loads configuration from `VBS_CONFIG`, or ./config.toml when unset.
pub fn load_default_config() -> Result<Config> {
    let path = std::env::var("VBS_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    load_config(path)
}

/// Inserts configured classes, sections and teachers that are not present yet.
///
/// Existing rows (matched by class name, section code and teacher phone) are
/// left untouched.
pub async fn seed_event(db: &DatabaseConnection, config: &Config) -> Result<()> {
    let mut inserted = 0usize;

    for class_config in &config.classes {
        let existing = Class::find()
            .filter(class::Column::Name.eq(&class_config.name))
            .one(db)
            .await?;

        let class_row = if let Some(row) = existing {
            row
        } else {
            inserted += 1;
            class::ActiveModel {
                name: Set(class_config.name.clone()),
                min_age: Set(class_config.min_age),
                max_age: Set(class_config.max_age),
                max_capacity: Set(class_config.max_capacity),
                ..Default::default()
            }
            .insert(db)
            .await?
        };

        for section_config in &class_config.sections {
            let exists = Section::find()
                .filter(section::Column::SectionCode.eq(&section_config.code))
                .one(db)
                .await?
                .is_some();
            if exists {
                continue;
            }

            inserted += 1;
            section::ActiveModel {
                class_id: Set(class_row.id),
                section_code: Set(section_config.code.clone()),
                display_name: Set(section_config
                    .display_name
                    .clone()
                    .unwrap_or_else(|| section_config.code.clone())),
                max_capacity: Set(section_config.max_capacity),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
    }

    for teacher_config in &config.teachers {
        let exists = Teacher::find()
            .filter(teacher::Column::Phone.eq(&teacher_config.phone))
            .one(db)
            .await?
            .is_some();
        if exists {
            continue;
        }

        inserted += 1;
        teacher::ActiveModel {
            name: Set(teacher_config.name.clone()),
            phone: Set(teacher_config.phone.clone()),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    info!("Seeded {inserted} class, section and teacher rows");
    Ok(())
}
