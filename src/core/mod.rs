//! Core business logic.
//!
//! Everything here takes an explicit database handle and returns
//! [`crate::errors::Result`]; the HTTP layer in [`crate::api`] is a thin
//! adapter over these functions.

/// Acknowledgement id generation and duplicate detection
pub mod acknowledgement;
/// Age-based class and section allocation
pub mod allocation;
/// Teacher-to-section assignment
pub mod assignment;
/// Phone one-time-code sign-in and sessions
pub mod auth;
/// Admin dashboard counts, rosters, search and reassignment
pub mod dashboard;
/// Parent-facing registration workflow
pub mod registration;
/// Daily counts and spreadsheet export
pub mod report;
/// Last year's roster lookup
pub mod roster;
/// Column sort state shared by admin tables
pub mod sorting;
/// Signed-in teacher's sections and students
pub mod teacher_dashboard;
/// Local form validation
pub mod validation;
