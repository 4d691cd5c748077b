//! Teacher entity - Staff who sign in with a phone one-time code.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Teacher database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "teachers")]
pub struct Model {
    /// Unique identifier for the teacher
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Phone number in `+91XXXXXXXXXX` form
    #[sea_orm(unique)]
    pub phone: String,
}

/// Defines relationships between Teacher and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One teacher can be assigned to many sections
    #[sea_orm(has_many = "super::section_teacher::Entity")]
    SectionTeachers,
}

impl Related<super::section_teacher::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SectionTeachers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
