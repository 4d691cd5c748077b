//! Prior-year roster entity - Read-only list of last year's children.
//!
//! Used only to locate returning families and pre-fill a new registration.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Prior-year roster database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "prior_roster")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Child's first name
    pub first_name: String,
    /// Child's last name
    pub last_name: String,
    /// Family name
    pub surname: String,
    /// Date of birth
    pub date_of_birth: Date,
    /// Parent or guardian name
    pub parent_name: String,
    /// Contact number
    pub phone_number: String,
    /// Known allergies, if any
    pub allergies: Option<String>,
    /// Medical notes, if any
    pub medical_notes: Option<String>,
}

/// The prior-year roster is standalone
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
