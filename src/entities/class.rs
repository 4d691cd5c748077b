//! Class entity - An age band of the programme (e.g. "Beginners", ages 4-6).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Class database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "classes")]
pub struct Model {
    /// Unique identifier for the class
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Class name
    #[sea_orm(unique)]
    pub name: String,
    /// Youngest eligible age, inclusive
    pub min_age: i32,
    /// Oldest eligible age, inclusive
    pub max_age: i32,
    /// Capacity across all sections
    pub max_capacity: i32,
}

/// Defines relationships between Class and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One class is split into many sections
    #[sea_orm(has_many = "super::section::Entity")]
    Sections,
    /// One class has many allocations
    #[sea_orm(has_many = "super::allocation::Entity")]
    Allocations,
}

impl Related<super::section::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sections.def()
    }
}

impl Related<super::allocation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl Model {
    /// Whether `age` falls inside this class's inclusive bounds.
    #[must_use]
    pub const fn accepts_age(&self, age: i32) -> bool {
        age >= self.min_age && age <= self.max_age
    }
}

impl ActiveModelBehavior for ActiveModel {}
