//! Session entity - Signed-in staff principals and their role claim.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Session database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Bearer token presented by the client
    #[sea_orm(unique)]
    pub token: String,
    /// Phone number that signed in
    pub phone: String,
    /// Role claim: `"admin"` or `"teacher"`
    pub role: String,
    /// Teacher row for the phone, when there is one
    pub teacher_id: Option<i64>,
    /// When the session stops being accepted
    pub expires_at: DateTimeUtc,
}

/// Sessions have no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
