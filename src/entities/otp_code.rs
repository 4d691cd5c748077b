//! One-time code entity - Pending phone sign-in codes.
//!
//! Only a SHA-256 hash of the code is stored.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One-time code database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "otp_codes")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Phone number the code was sent to
    pub phone: String,
    /// Hex-encoded SHA-256 of the code
    pub code_hash: String,
    /// When the code stops being accepted
    pub expires_at: DateTimeUtc,
    /// Wrong guesses made against this code
    pub attempts: i32,
    /// Set once the code has been exchanged for a session or locked out
    pub consumed: bool,
}

/// One-time codes have no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
