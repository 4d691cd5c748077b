//! Registration entity - One child registered for the current year's programme.
//!
//! A row is written exactly once, when the parent picks a payment method.
//! After that only the allocation attached to it changes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Current-year registration database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "registrations")]
pub struct Model {
    /// Unique identifier for the registration
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Child's first name
    pub first_name: String,
    /// Child's last name
    pub last_name: String,
    /// Family name
    pub surname: String,
    /// Date of birth, used for duplicate detection and age-based allocation
    pub date_of_birth: Date,
    /// Parent or guardian name
    pub parent_name: String,
    /// Contact number, 10 digits without country prefix
    pub phone_number: String,
    /// Acknowledgement id handed to the parent as proof of registration
    #[sea_orm(unique)]
    pub acknowledgement_id: String,
    /// `"cash"` or `"upi"`
    pub payment_method: String,
    /// Payment status recorded at submission time
    pub payment_status: String,
    /// Age in whole years on the day of registration
    pub age: i32,
    /// Known allergies, if any
    pub allergies: Option<String>,
    /// Medical notes, if any
    pub medical_notes: Option<String>,
    /// When the registration was submitted
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Registration and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A registration has at most one allocation
    #[sea_orm(has_one = "super::allocation::Entity")]
    Allocation,
}

impl Related<super::allocation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocation.def()
    }
}

impl Model {
    /// Child's name as shown on rosters: first, last, surname.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {} {}", self.first_name, self.last_name, self.surname)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl ActiveModelBehavior for ActiveModel {}
