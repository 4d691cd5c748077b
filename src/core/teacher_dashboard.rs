//! Read-only view of a signed-in teacher's sections and students.

use crate::{
    entities::{
        Allocation, Class, Registration, Section, SectionTeacher, allocation, registration,
        section_teacher,
    },
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::{QueryOrder, prelude::*};
use serde::Serialize;
use tracing::instrument;

/// A student as shown to their teacher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentCard {
    pub child_id: i64,
    pub full_name: String,
    pub parent_name: String,
    pub phone_number: String,
    pub date_of_birth: NaiveDate,
    pub allergies: Option<String>,
    pub medical_notes: Option<String>,
    /// Allergies or medical notes are recorded
    pub has_medical_flags: bool,
}

/// One section the teacher is assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeacherSection {
    pub section_id: i64,
    pub section_name: String,
    pub class_name: String,
    pub min_age: i32,
    pub max_age: i32,
    pub is_primary: bool,
    pub enrolled: u64,
    pub max_capacity: i32,
    pub students: Vec<StudentCard>,
}

impl TeacherSection {
    /// Capacity label, e.g. `"12/20"`.
    #[must_use]
    pub fn capacity_label(&self) -> String {
        format!("{}/{}", self.enrolled, self.max_capacity)
    }
}

fn has_text(value: Option<&String>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

impl From<registration::Model> for StudentCard {
    fn from(child: registration::Model) -> Self {
        let has_medical_flags = has_text(child.allergies.as_ref()) || has_text(child.medical_notes.as_ref());
        Self {
            child_id: child.id,
            full_name: child.full_name(),
            parent_name: child.parent_name,
            phone_number: child.phone_number,
            date_of_birth: child.date_of_birth,
            allergies: child.allergies,
            medical_notes: child.medical_notes,
            has_medical_flags,
        }
    }
}

/// Sections assigned to `teacher_id`, each with its allocated students.
#[instrument(skip(db))]
pub async fn teacher_classes(db: &DatabaseConnection, teacher_id: i64) -> Result<Vec<TeacherSection>> {
    let assignments = SectionTeacher::find()
        .filter(section_teacher::Column::TeacherId.eq(teacher_id))
        .order_by_asc(section_teacher::Column::SectionId)
        .all(db)
        .await?;

    let mut sections = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let Some(section) = Section::find_by_id(assignment.section_id).one(db).await? else {
            continue;
        };
        let Some(class) = Class::find_by_id(section.class_id).one(db).await? else {
            continue;
        };

        let child_ids: Vec<i64> = Allocation::find()
            .filter(allocation::Column::SectionId.eq(section.id))
            .all(db)
            .await?
            .into_iter()
            .map(|a| a.registration_id)
            .collect();
        let students: Vec<StudentCard> = Registration::find()
            .filter(registration::Column::Id.is_in(child_ids))
            .order_by_asc(registration::Column::FirstName)
            .order_by_asc(registration::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(StudentCard::from)
            .collect();

        sections.push(TeacherSection {
            section_id: section.id,
            section_name: section.display_name,
            class_name: class.name,
            min_age: class.min_age,
            max_age: class.max_age,
            is_primary: assignment.is_primary,
            enrolled: u64::try_from(students.len())?,
            max_capacity: section.max_capacity,
            students,
        });
    }
    Ok(sections)
}
