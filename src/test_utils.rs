//! Shared test utilities for the registration service.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test rows with sensible defaults.

use crate::{
    config::EventSettings,
    core::{
        allocation::calculate_age,
        auth::{OtpDispatcher, Role},
        validation::RegistrationForm,
    },
    entities::{
        allocation, class, prior_roster, registration, section, section_teacher, session, teacher,
    },
    errors::Result,
};
use chrono::{Duration, Local, Months, NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::Mutex;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Routes `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Shorthand for a calendar date; panics on an invalid date.
#[allow(clippy::unwrap_used)]
#[must_use]
pub fn test_date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// A birth date that makes the child exactly `age` today.
#[allow(clippy::unwrap_used)]
#[must_use]
pub fn dob_for_age(age: u32) -> NaiveDate {
    Local::now()
        .date_naive()
        .checked_sub_months(Months::new(age * 12 + 1))
        .unwrap()
}

/// A complete, valid registration form.
///
/// # Defaults
/// * last name `"K"`, surname `"Thomas"`
/// * parent `"Priya Thomas"`, phone `"9876543210"`
#[must_use]
pub fn test_form(first_name: &str, date_of_birth: NaiveDate) -> RegistrationForm {
    RegistrationForm {
        first_name: first_name.to_string(),
        last_name: "K".to_string(),
        surname: "Thomas".to_string(),
        date_of_birth: date_of_birth.format("%Y-%m-%d").to_string(),
        parent_name: "Priya Thomas".to_string(),
        phone_number: "9876543210".to_string(),
        allergies: None,
        medical_notes: None,
    }
}

/// Event settings with prefix `"VBS2025"` and allocation enabled.
#[must_use]
pub fn test_event_settings() -> EventSettings {
    EventSettings {
        year: 2025,
        acknowledgement_prefix: "VBS2025".to_string(),
        allocate_on_register: true,
    }
}

/// Inserts a registration row directly, bypassing the workflow.
pub async fn create_test_registration(
    db: &DatabaseConnection,
    first_name: &str,
    date_of_birth: NaiveDate,
    acknowledgement_id: &str,
) -> Result<registration::Model> {
    registration::ActiveModel {
        first_name: Set(first_name.to_string()),
        last_name: Set("K".to_string()),
        surname: Set("Thomas".to_string()),
        date_of_birth: Set(date_of_birth),
        parent_name: Set("Priya Thomas".to_string()),
        phone_number: Set("9876543210".to_string()),
        acknowledgement_id: Set(acknowledgement_id.to_string()),
        payment_method: Set("cash".to_string()),
        payment_status: Set("completed".to_string()),
        age: Set(calculate_age(date_of_birth)),
        allergies: Set(None),
        medical_notes: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Like [`create_test_registration`], for a child exactly `age` today.
pub async fn create_test_registration_aged(
    db: &DatabaseConnection,
    first_name: &str,
    age: u32,
    acknowledgement_id: &str,
) -> Result<registration::Model> {
    create_test_registration(db, first_name, dob_for_age(age), acknowledgement_id).await
}

/// Places a registration in a section without capacity checks.
pub async fn allocate_directly(
    db: &DatabaseConnection,
    registration_id: i64,
    section: &section::Model,
) -> Result<allocation::Model> {
    allocation::ActiveModel {
        registration_id: Set(registration_id),
        class_id: Set(section.class_id),
        section_id: Set(section.id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Inserts a child into last year's roster.
pub async fn create_test_prior_child(
    db: &DatabaseConnection,
    first_name: &str,
    date_of_birth: NaiveDate,
) -> Result<prior_roster::Model> {
    prior_roster::ActiveModel {
        first_name: Set(first_name.to_string()),
        last_name: Set("K".to_string()),
        surname: Set("Thomas".to_string()),
        date_of_birth: Set(date_of_birth),
        parent_name: Set("Priya Thomas".to_string()),
        phone_number: Set("9876543210".to_string()),
        allergies: Set(Some("Peanuts".to_string())),
        medical_notes: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Rows created by [`seed_test_event`].
#[derive(Debug, Clone)]
pub struct TestFixture {
    pub beginners: class::Model,
    pub primary: class::Model,
    pub beginners_a: section::Model,
    pub beginners_b: section::Model,
    pub primary_a: section::Model,
    pub mary: teacher::Model,
    pub john: teacher::Model,
}

/// Inserts a class row.
pub async fn insert_class(
    db: &DatabaseConnection,
    name: &str,
    min_age: i32,
    max_age: i32,
    max_capacity: i32,
) -> Result<class::Model> {
    class::ActiveModel {
        name: Set(name.to_string()),
        min_age: Set(min_age),
        max_age: Set(max_age),
        max_capacity: Set(max_capacity),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Inserts a section whose display name is its code.
pub async fn insert_section(
    db: &DatabaseConnection,
    class_id: i64,
    code: &str,
    max_capacity: i32,
) -> Result<section::Model> {
    section::ActiveModel {
        class_id: Set(class_id),
        section_code: Set(code.to_string()),
        display_name: Set(code.to_string()),
        max_capacity: Set(max_capacity),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

async fn insert_teacher(db: &DatabaseConnection, name: &str, phone: &str) -> Result<teacher::Model> {
    teacher::ActiveModel {
        name: Set(name.to_string()),
        phone: Set(phone.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Seeds two classes and their sections plus two teachers.
///
/// * Beginners, ages 4-6: `BEGINNERS-A` and `BEGINNERS-B`, 20 seats each
/// * Primary, ages 7-9: `PRIMARY-A` with a single seat
/// * Mary (`+919811111111`) leads `BEGINNERS-A`; John (`+919822222222`) is
///   unassigned
pub async fn seed_test_event(db: &DatabaseConnection) -> Result<TestFixture> {
    let beginners = insert_class(db, "Beginners", 4, 6, 40).await?;
    let primary = insert_class(db, "Primary", 7, 9, 1).await?;
    let beginners_a = insert_section(db, beginners.id, "BEGINNERS-A", 20).await?;
    let beginners_b = insert_section(db, beginners.id, "BEGINNERS-B", 20).await?;
    let primary_a = insert_section(db, primary.id, "PRIMARY-A", 1).await?;
    let mary = insert_teacher(db, "Mary", "+919811111111").await?;
    let john = insert_teacher(db, "John", "+919822222222").await?;

    section_teacher::ActiveModel {
        teacher_id: Set(mary.id),
        section_id: Set(beginners_a.id),
        is_primary: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(TestFixture {
        beginners,
        primary,
        beginners_a,
        beginners_b,
        primary_a,
        mary,
        john,
    })
}

/// Keeps every dispatched one-time code for inspection.
#[derive(Debug, Default)]
pub struct CapturingDispatcher {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl CapturingDispatcher {
    /// The most recently dispatched code; panics when none was sent.
    #[allow(clippy::unwrap_used)]
    #[must_use]
    pub fn last_code(&self) -> String {
        self.sent.lock().unwrap().last().unwrap().1.clone()
    }
}

impl OtpDispatcher for CapturingDispatcher {
    #[allow(clippy::unwrap_used)]
    fn dispatch(&self, phone: &str, code: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((phone.to_string(), code.to_string()));
        Ok(())
    }
}

/// Inserts a session valid for an hour and returns its bearer token.
pub async fn create_test_session(
    db: &DatabaseConnection,
    role: Role,
    phone: &str,
    teacher_id: Option<i64>,
) -> Result<String> {
    let token = format!("test-{}-{phone}", role.as_str());
    session::ActiveModel {
        token: Set(token.clone()),
        phone: Set(phone.to_string()),
        role: Set(role.as_str().to_string()),
        teacher_id: Set(teacher_id),
        expires_at: Set(Utc::now() + Duration::hours(1)),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(token)
}
