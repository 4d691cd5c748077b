//! Teacher-to-section assignment.
//!
//! A teacher may lead or help in several sections and a section may have
//! several teachers, but each (teacher, section) pair exists at most once.

use crate::{
    core::sorting::{SortState, compare_text, sort_rows},
    entities::{
        Allocation, Class, Section, SectionTeacher, Teacher, allocation, section, section_teacher,
        teacher,
    },
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, SqlErr, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, instrument, warn};

/// One assignment as listed on the admin page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentRow {
    pub assignment_id: i64,
    pub teacher_id: i64,
    pub teacher_name: String,
    pub section_id: i64,
    pub class_section: String,
    pub class_name: String,
    /// Children currently allocated to the section
    pub student_count: u64,
    pub is_primary: bool,
}

/// Sortable assignment columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentField {
    #[default]
    TeacherName,
    ClassSection,
    StudentCount,
}

/// Every assignment with its section's current student count, ordered by
/// teacher name then section.
#[instrument(skip(db))]
pub async fn list_assignments(db: &DatabaseConnection) -> Result<Vec<AssignmentRow>> {
    let assignments = SectionTeacher::find()
        .order_by_asc(section_teacher::Column::Id)
        .all(db)
        .await?;

    let teachers: HashMap<i64, teacher::Model> = Teacher::find()
        .all(db)
        .await?
        .into_iter()
        .map(|t| (t.id, t))
        .collect();
    let sections: HashMap<i64, section::Model> = Section::find()
        .all(db)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();
    let class_names: HashMap<i64, String> = Class::find()
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    let mut counts: HashMap<i64, u64> = HashMap::new();
    let mut rows = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let (Some(t), Some(s)) = (
            teachers.get(&assignment.teacher_id),
            sections.get(&assignment.section_id),
        ) else {
            warn!("Skipping dangling assignment {}", assignment.id);
            continue;
        };

        let student_count = if let Some(count) = counts.get(&s.id) {
            *count
        } else {
            let count = Allocation::find()
                .filter(allocation::Column::SectionId.eq(s.id))
                .count(db)
                .await?;
            counts.insert(s.id, count);
            count
        };

        rows.push(AssignmentRow {
            assignment_id: assignment.id,
            teacher_id: t.id,
            teacher_name: t.name.clone(),
            section_id: s.id,
            class_section: s.display_name.clone(),
            class_name: class_names.get(&s.class_id).cloned().unwrap_or_default(),
            student_count,
            is_primary: assignment.is_primary,
        });
    }

    rows.sort_by(|a, b| {
        compare_text(&a.teacher_name, &b.teacher_name)
            .then_with(|| compare_text(&a.class_section, &b.class_section))
    });
    Ok(rows)
}

/// All teachers, ordered by name.
pub async fn list_teachers(db: &DatabaseConnection) -> Result<Vec<teacher::Model>> {
    Teacher::find()
        .order_by_asc(teacher::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// All sections, ordered by display name.
pub async fn list_sections(db: &DatabaseConnection) -> Result<Vec<section::Model>> {
    Section::find()
        .order_by_asc(section::Column::DisplayName)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Whether the teacher is already assigned to the section.
pub async fn assignment_exists<C>(db: &C, teacher_id: i64, section_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    Ok(SectionTeacher::find()
        .filter(section_teacher::Column::TeacherId.eq(teacher_id))
        .filter(section_teacher::Column::SectionId.eq(section_id))
        .one(db)
        .await?
        .is_some())
}

/// Assigns a teacher to a section.
///
/// An existing pair is rejected before any insert is issued. Two admins
/// racing past that check are caught by the unique pair index, which also
/// surfaces as `AlreadyAssigned`.
#[instrument(skip(db))]
pub async fn assign_teacher<C>(
    db: &C,
    teacher_id: i64,
    section_id: i64,
    is_primary: bool,
) -> Result<section_teacher::Model>
where
    C: ConnectionTrait,
{
    if assignment_exists(db, teacher_id, section_id).await? {
        return Err(Error::AlreadyAssigned {
            teacher_id,
            section_id,
        });
    }

    Teacher::find_by_id(teacher_id)
        .one(db)
        .await?
        .ok_or(Error::TeacherNotFound { id: teacher_id })?;
    Section::find_by_id(section_id)
        .one(db)
        .await?
        .ok_or(Error::SectionNotFound { id: section_id })?;

    let inserted = section_teacher::ActiveModel {
        teacher_id: Set(teacher_id),
        section_id: Set(section_id),
        is_primary: Set(is_primary),
        ..Default::default()
    }
    .insert(db)
    .await;

    match inserted {
        Ok(row) => {
            info!("Assigned teacher {teacher_id} to section {section_id}");
            Ok(row)
        }
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            Err(Error::AlreadyAssigned {
                teacher_id,
                section_id,
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Sorts assignment rows in place.
pub fn sort_assignments(rows: &mut [AssignmentRow], state: SortState<AssignmentField>) {
    sort_rows(rows, state.direction, |a, b| match state.field {
        AssignmentField::TeacherName => compare_text(&a.teacher_name, &b.teacher_name),
        AssignmentField::ClassSection => compare_text(&a.class_section, &b.class_section),
        AssignmentField::StudentCount => a.student_count.cmp(&b.student_count),
    });
}

/// Sum of student counts over the listed rows.
///
/// A section with two teachers is counted once per row.
#[must_use]
pub fn total_students(rows: &[AssignmentRow]) -> u64 {
    rows.iter().map(|r| r.student_count).sum()
}

/// Sum of student counts over one teacher's rows.
#[must_use]
pub fn students_for_teacher(rows: &[AssignmentRow], teacher_name: &str) -> u64 {
    rows.iter()
        .filter(|r| r.teacher_name == teacher_name)
        .map(|r| r.student_count)
        .sum()
}
