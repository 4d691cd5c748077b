//! Age-based class and section allocation.
//!
//! A child's class is the one whose inclusive age bounds contain the child's
//! age. Within the class the child goes to the section with the fewest
//! allocations. Run [`allocate_child`] inside the registration transaction so
//! the capacity check and the insert are not separated by other writers.

use crate::{
    entities::{
        Allocation, Class, Section, SectionTeacher, Teacher, allocation, class, section,
        section_teacher,
    },
    errors::{Error, Result},
};
use chrono::{Datelike, Local, NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// Where a child was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationResult {
    pub class_id: i64,
    pub class_name: String,
    pub section_id: i64,
    pub section_name: String,
    /// Teacher of the section, primary teacher first
    pub teacher_name: Option<String>,
}

/// A section together with its current number of allocated children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionLoad {
    pub section: section::Model,
    pub current_count: u64,
}

impl SectionLoad {
    /// Whether another child would exceed the section's capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.current_count >= u64::try_from(self.section.max_capacity).unwrap_or(0)
    }
}

/// Age in whole years on `today`.
///
/// The year difference is reduced by one when today's month/day comes before
/// the birth month/day.
#[must_use]
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}

/// Age in whole years on the local calendar date.
#[must_use]
pub fn calculate_age(date_of_birth: NaiveDate) -> i32 {
    age_on(date_of_birth, Local::now().date_naive())
}

/// Picks the class whose age bounds contain `age`.
///
/// When bounds overlap, the class with the lowest `min_age` (then lowest id)
/// wins and a warning is logged.
pub fn find_class_for_age(classes: &[class::Model], age: i32) -> Result<&class::Model> {
    let mut matching: Vec<&class::Model> = classes.iter().filter(|c| c.accepts_age(age)).collect();
    matching.sort_by_key(|c| (c.min_age, c.id));

    if matching.len() > 1 {
        warn!(
            "{} classes accept age {age}; using {}",
            matching.len(),
            matching[0].name
        );
    }

    matching
        .first()
        .copied()
        .ok_or(Error::NoEligibleClass { age })
}

/// The least-populated section; ties go to the first in input order.
#[must_use]
pub fn pick_least_populated(loads: &[SectionLoad]) -> Option<&SectionLoad> {
    loads.iter().min_by_key(|load| load.current_count)
}

/// Current allocation count for every section of a class, in section id order.
pub async fn section_loads<C>(db: &C, class_id: i64) -> Result<Vec<SectionLoad>>
where
    C: ConnectionTrait,
{
    let sections = Section::find()
        .filter(section::Column::ClassId.eq(class_id))
        .order_by_asc(section::Column::Id)
        .all(db)
        .await?;

    let mut loads = Vec::with_capacity(sections.len());
    for section in sections {
        let current_count = Allocation::find()
            .filter(allocation::Column::SectionId.eq(section.id))
            .count(db)
            .await?;
        loads.push(SectionLoad {
            section,
            current_count,
        });
    }
    Ok(loads)
}

/// Name of the teacher assigned to a section, preferring the primary teacher.
pub async fn section_teacher_name<C>(db: &C, section_id: i64) -> Result<Option<String>>
where
    C: ConnectionTrait,
{
    let assignment = SectionTeacher::find()
        .filter(section_teacher::Column::SectionId.eq(section_id))
        .order_by_desc(section_teacher::Column::IsPrimary)
        .order_by_asc(section_teacher::Column::Id)
        .one(db)
        .await?;

    let Some(assignment) = assignment else {
        return Ok(None);
    };

    Ok(Teacher::find_by_id(assignment.teacher_id)
        .one(db)
        .await?
        .map(|teacher| teacher.name))
}

/// Allocates a registration to the least-populated section of its age class.
///
/// Sections already at capacity are skipped, so a small full section never
/// blocks a larger one with free seats.
///
/// # Errors
/// * `NoEligibleClass` - no class accepts the age
/// * `ClassHasNoSections` - the matching class has no sections configured
/// * `SectionFull` - every section of the class is at capacity
#[instrument(skip(db))]
pub async fn allocate_child<C>(db: &C, registration_id: i64, age: i32) -> Result<AllocationResult>
where
    C: ConnectionTrait,
{
    let classes = Class::find()
        .order_by_asc(class::Column::Id)
        .all(db)
        .await?;
    let chosen_class = find_class_for_age(&classes, age)?;

    let loads = section_loads(db, chosen_class.id).await?;
    debug!("Section loads for {}: {:?}", chosen_class.name, loads);
    if loads.is_empty() {
        return Err(Error::ClassHasNoSections {
            class: chosen_class.name.clone(),
        });
    }

    let (open, full): (Vec<SectionLoad>, Vec<SectionLoad>) =
        loads.into_iter().partition(|load| !load.is_full());
    let Some(target) = pick_least_populated(&open) else {
        let section = pick_least_populated(&full)
            .map_or_else(|| chosen_class.name.clone(), |load| load.section.display_name.clone());
        return Err(Error::SectionFull { section });
    };

    allocation::ActiveModel {
        registration_id: Set(registration_id),
        class_id: Set(chosen_class.id),
        section_id: Set(target.section.id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let teacher_name = section_teacher_name(db, target.section.id).await?;
    info!(
        "Allocated registration {registration_id} to {}",
        target.section.display_name
    );

    Ok(AllocationResult {
        class_id: chosen_class.id,
        class_name: chosen_class.name.clone(),
        section_id: target.section.id,
        section_name: target.section.display_name.clone(),
        teacher_name,
    })
}
