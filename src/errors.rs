//! Unified error type for the registration service.
//!
//! Every failure is a variant of [`Error`]. The HTTP layer turns each one into
//! a short banner message via [`Error::user_message`]; nothing is retried.

use thiserror::Error;

/// All errors surfaced by core operations and the HTTP layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Integer conversion error: {0}")]
    IntConversion(#[from] std::num::TryFromIntError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("This child is already registered with Acknowledgement ID: {acknowledgement_id}")]
    DuplicateRegistration { acknowledgement_id: String },

    #[error("Registration not found: {id}")]
    RegistrationNotFound { id: i64 },

    #[error("Section not found: {id}")]
    SectionNotFound { id: i64 },

    #[error("Teacher not found: {id}")]
    TeacherNotFound { id: i64 },

    #[error("Registration draft not found")]
    DraftNotFound,

    #[error("No class accepts age {age}")]
    NoEligibleClass { age: i32 },

    #[error("Class {class} has no sections")]
    ClassHasNoSections { class: String },

    #[error("Section {section} is full")]
    SectionFull { section: String },

    #[error("Section change rejected: {reason}")]
    SectionChangeRejected { reason: String },

    #[error("Teacher {teacher_id} is already assigned to section {section_id}")]
    AlreadyAssigned { teacher_id: i64, section_id: i64 },

    #[error("Phone number not registered as a teacher")]
    UnknownTeacherPhone,

    #[error("Invalid or expired verification code")]
    InvalidCode,

    #[error("Code dispatch failed: {message}")]
    Dispatch { message: String },

    #[error("Not signed in")]
    Unauthorized,

    #[error("Not permitted")]
    Forbidden,

    #[error("Workflow is at step {actual}, expected {expected}")]
    InvalidStep {
        expected: &'static str,
        actual: &'static str,
    },
}

impl Error {
    /// Shorthand for a field validation failure.
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// The human-readable text shown in the dismissible banner.
    ///
    /// Business failures carry their own wording; infrastructure failures are
    /// collapsed into a generic retry hint since the detail is only useful in
    /// the logs.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message, .. } => message.clone(),
            Self::DuplicateRegistration { .. }
            | Self::SectionFull { .. }
            | Self::AlreadyAssigned { .. }
            | Self::InvalidCode
            | Self::NoEligibleClass { .. }
            | Self::ClassHasNoSections { .. } => self.to_string(),
            Self::SectionChangeRejected { reason } => reason.clone(),
            Self::UnknownTeacherPhone => {
                "Phone number not registered as a teacher. Please contact the administrator."
                    .to_string()
            }
            Self::RegistrationNotFound { .. }
            | Self::SectionNotFound { .. }
            | Self::TeacherNotFound { .. } => self.to_string(),
            Self::DraftNotFound => {
                "Your registration session has expired. Please fill in the form again.".to_string()
            }
            Self::InvalidStep { .. } => {
                "This step is not available right now. Please start the registration again."
                    .to_string()
            }
            Self::Unauthorized => "Please sign in to continue.".to_string(),
            Self::Forbidden => "You do not have access to this page.".to_string(),
            Self::Dispatch { .. } => {
                "Could not send the verification code. Please try again.".to_string()
            }
            Self::Config { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::EnvVar(_)
            | Self::IntConversion(_)
            | Self::Task(_) => "An error occurred. Please try again.".to_string(),
        }
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
