//! Section entity - A capacity-bounded subdivision of a class.
//!
//! Children are allocated into exactly one section within their class.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Class section database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "class_sections")]
pub struct Model {
    /// Unique identifier for the section
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the class this section belongs to
    pub class_id: i64,
    /// Short code (e.g. `"BEGINNERS-A"`)
    #[sea_orm(unique)]
    pub section_code: String,
    /// Label shown on rosters and dropdowns
    pub display_name: String,
    /// Maximum number of children allocated to this section
    pub max_capacity: i32,
}

/// Defines relationships between Section and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each section belongs to one class
    #[sea_orm(
        belongs_to = "super::class::Entity",
        from = "Column::ClassId",
        to = "super::class::Column::Id"
    )]
    Class,
    /// One section has many allocations
    #[sea_orm(has_many = "super::allocation::Entity")]
    Allocations,
    /// One section has many teacher assignments
    #[sea_orm(has_many = "super::section_teacher::Entity")]
    SectionTeachers,
}

impl Related<super::class::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Class.def()
    }
}

impl Related<super::allocation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl Related<super::section_teacher::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SectionTeachers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
