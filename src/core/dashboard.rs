//! Admin dashboard operations.
//!
//! Aggregate counts per class and section, section rosters, free-text search
//! and section reassignment. Reassignment reports business-rule failures in a
//! [`SectionChangeOutcome`] rather than an error; [`reassign_section`] turns a
//! non-success outcome into [`Error::SectionChangeRejected`] so it can never
//! pass as a silent no-op.

use crate::{
    core::{
        allocation::{find_class_for_age, section_loads, section_teacher_name},
        roster::substring_like,
        sorting::{SortState, compare_optional_text, compare_text, sort_rows},
    },
    entities::{Allocation, Class, Registration, Section, allocation, class, registration, section},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{Condition, DatabaseTransaction, QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument};

/// Number of allocated children in one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassCount {
    pub class_id: i64,
    pub class_name: String,
    pub total_count: u64,
}

/// Number of allocated children in one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionCount {
    pub section_id: i64,
    pub section_code: String,
    pub display_name: String,
    pub current_count: u64,
    pub max_capacity: i32,
}

/// A class with its per-section counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassOverview {
    pub class_id: i64,
    pub class_name: String,
    pub total_count: u64,
    pub sections: Vec<SectionCount>,
}

/// One row of a section roster or search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildDetails {
    pub child_id: i64,
    pub full_name: String,
    pub parent_name: String,
    pub phone_number: String,
    pub age: i32,
    pub class_section: Option<String>,
    pub teacher_name: Option<String>,
    pub acknowledgement_id: String,
    pub registered_on: NaiveDate,
}

/// Sortable roster columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterField {
    #[default]
    FullName,
    ParentName,
    Age,
    ClassSection,
    TeacherName,
}

/// A section offered in the reassignment dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionOption {
    pub section_id: i64,
    pub display_name: String,
    pub current_count: u64,
    pub max_capacity: i32,
    /// Full sections are shown but cannot be picked
    pub is_full: bool,
}

/// Result payload of a reassignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionChangeOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl SectionChangeOutcome {
    const fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(reason.into()),
        }
    }
}

/// What happened when a section header was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionToggle {
    /// The section is now open and its roster should be loaded
    Opened(i64),
    /// The section was already open and is now collapsed
    Collapsed,
}

/// Drill-down selection: at most one open class and one open section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrillDown {
    pub open_class: Option<i64>,
    pub open_section: Option<i64>,
}

impl DrillDown {
    /// Opens `class_id`, or collapses it when it is already open. Either way
    /// the open section is cleared.
    pub fn select_class(&mut self, class_id: i64) {
        self.open_class = if self.open_class == Some(class_id) {
            None
        } else {
            Some(class_id)
        };
        self.open_section = None;
    }

    /// Opens `section_id`, or collapses it when it is already open.
    pub fn select_section(&mut self, section_id: i64) -> SectionToggle {
        if self.open_section == Some(section_id) {
            self.open_section = None;
            SectionToggle::Collapsed
        } else {
            self.open_section = Some(section_id);
            SectionToggle::Opened(section_id)
        }
    }
}

/// Allocated children per class, in class id order.
#[instrument(skip(db))]
pub async fn class_counts(db: &DatabaseConnection) -> Result<Vec<ClassCount>> {
    let classes = Class::find()
        .order_by_asc(class::Column::Id)
        .all(db)
        .await?;

    let mut counts = Vec::with_capacity(classes.len());
    for class_row in classes {
        let total_count = Allocation::find()
            .filter(allocation::Column::ClassId.eq(class_row.id))
            .count(db)
            .await?;
        counts.push(ClassCount {
            class_id: class_row.id,
            class_name: class_row.name,
            total_count,
        });
    }
    Ok(counts)
}

/// Allocated children per section of a class.
#[instrument(skip(db))]
pub async fn section_counts(db: &DatabaseConnection, class_id: i64) -> Result<Vec<SectionCount>> {
    Ok(section_loads(db, class_id)
        .await?
        .into_iter()
        .map(|load| SectionCount {
            section_id: load.section.id,
            section_code: load.section.section_code,
            display_name: load.section.display_name,
            current_count: load.current_count,
            max_capacity: load.section.max_capacity,
        })
        .collect())
}

/// Class counts joined with per-class section counts.
///
/// One section-count request per class runs concurrently; all of them are
/// joined before returning and any failure fails the whole overview.
pub async fn class_overview(db: &Arc<DatabaseConnection>) -> Result<Vec<ClassOverview>> {
    let classes = class_counts(db).await?;

    let mut tasks = JoinSet::new();
    for (index, class_count) in classes.iter().enumerate() {
        let db = Arc::clone(db);
        let class_id = class_count.class_id;
        tasks.spawn(async move { (index, section_counts(&db, class_id).await) });
    }

    let mut sections_by_index: HashMap<usize, Vec<SectionCount>> = HashMap::new();
    while let Some(joined) = tasks.join_next().await {
        let (index, sections) = joined?;
        sections_by_index.insert(index, sections?);
    }

    Ok(classes
        .into_iter()
        .enumerate()
        .map(|(index, class_count)| ClassOverview {
            class_id: class_count.class_id,
            class_name: class_count.class_name,
            total_count: class_count.total_count,
            sections: sections_by_index.remove(&index).unwrap_or_default(),
        })
        .collect())
}

/// Builds roster rows for registrations, resolving section and teacher names.
async fn child_details(
    db: &DatabaseConnection,
    registrations: Vec<registration::Model>,
) -> Result<Vec<ChildDetails>> {
    let ids: Vec<i64> = registrations.iter().map(|r| r.id).collect();
    let allocations: HashMap<i64, allocation::Model> = Allocation::find()
        .filter(allocation::Column::RegistrationId.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|a| (a.registration_id, a))
        .collect();
    let sections: HashMap<i64, section::Model> = Section::find()
        .all(db)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();

    let mut teachers: HashMap<i64, Option<String>> = HashMap::new();
    let mut rows = Vec::with_capacity(registrations.len());
    for child in registrations {
        let section = allocations
            .get(&child.id)
            .and_then(|a| sections.get(&a.section_id));

        let teacher_name = match section {
            Some(s) => {
                if !teachers.contains_key(&s.id) {
                    teachers.insert(s.id, section_teacher_name(db, s.id).await?);
                }
                teachers.get(&s.id).cloned().flatten()
            }
            None => None,
        };

        rows.push(ChildDetails {
            child_id: child.id,
            full_name: child.full_name(),
            parent_name: child.parent_name.clone(),
            phone_number: child.phone_number.clone(),
            age: child.age,
            class_section: section.map(|s| s.display_name.clone()),
            teacher_name,
            acknowledgement_id: child.acknowledgement_id.clone(),
            registered_on: child.created_at.date_naive(),
        });
    }
    Ok(rows)
}

/// Children allocated to one section.
#[instrument(skip(db))]
pub async fn section_roster(db: &DatabaseConnection, section_id: i64) -> Result<Vec<ChildDetails>> {
    Section::find_by_id(section_id)
        .one(db)
        .await?
        .ok_or(Error::SectionNotFound { id: section_id })?;

    let ids: Vec<i64> = Allocation::find()
        .filter(allocation::Column::SectionId.eq(section_id))
        .all(db)
        .await?
        .into_iter()
        .map(|a| a.registration_id)
        .collect();

    let registrations = Registration::find()
        .filter(registration::Column::Id.is_in(ids))
        .order_by_asc(registration::Column::FirstName)
        .order_by_asc(registration::Column::Id)
        .all(db)
        .await?;

    child_details(db, registrations).await
}

/// Free-text search over current registrations.
///
/// Matches names, parent name, phone and acknowledgement id by substring
/// (case-insensitive), and class-section by exact code or display name
/// (case-insensitive). A blank term returns nothing.
#[instrument(skip(db))]
pub async fn search_children(db: &DatabaseConnection, term: &str) -> Result<Vec<ChildDetails>> {
    let term = term.trim();
    if term.is_empty() {
        return Ok(Vec::new());
    }

    let matching_sections: Vec<i64> = Section::find()
        .all(db)
        .await?
        .into_iter()
        .filter(|s| s.display_name.eq_ignore_ascii_case(term) || s.section_code.eq_ignore_ascii_case(term))
        .map(|s| s.id)
        .collect();

    let mut condition = Condition::any()
        .add(registration::Column::FirstName.like(substring_like(term)))
        .add(registration::Column::LastName.like(substring_like(term)))
        .add(registration::Column::Surname.like(substring_like(term)))
        .add(registration::Column::ParentName.like(substring_like(term)))
        .add(registration::Column::PhoneNumber.like(substring_like(term)))
        .add(registration::Column::AcknowledgementId.like(substring_like(term)));

    if !matching_sections.is_empty() {
        let in_sections: Vec<i64> = Allocation::find()
            .filter(allocation::Column::SectionId.is_in(matching_sections))
            .all(db)
            .await?
            .into_iter()
            .map(|a| a.registration_id)
            .collect();
        condition = condition.add(registration::Column::Id.is_in(in_sections));
    }

    let registrations = Registration::find()
        .filter(condition)
        .order_by_asc(registration::Column::FirstName)
        .order_by_asc(registration::Column::Id)
        .all(db)
        .await?;
    debug!("Search {term:?} matched {} registrations", registrations.len());

    child_details(db, registrations).await
}

/// Sorts roster rows in place by the given column and direction.
pub fn sort_roster(rows: &mut [ChildDetails], state: SortState<RosterField>) {
    sort_rows(rows, state.direction, |a, b| match state.field {
        RosterField::FullName => compare_text(&a.full_name, &b.full_name),
        RosterField::ParentName => compare_text(&a.parent_name, &b.parent_name),
        RosterField::Age => a.age.cmp(&b.age),
        RosterField::ClassSection => {
            compare_optional_text(a.class_section.as_deref(), b.class_section.as_deref())
        }
        RosterField::TeacherName => {
            compare_optional_text(a.teacher_name.as_deref(), b.teacher_name.as_deref())
        }
    });
}

/// Sections a child may be moved to, with their fill level.
///
/// These are the sections of the child's allocated class, or of the
/// age-eligible class for a child that has not been allocated yet.
#[instrument(skip(db))]
pub async fn available_sections(db: &DatabaseConnection, child_id: i64) -> Result<Vec<SectionOption>> {
    let child = Registration::find_by_id(child_id)
        .one(db)
        .await?
        .ok_or(Error::RegistrationNotFound { id: child_id })?;

    let current = Allocation::find()
        .filter(allocation::Column::RegistrationId.eq(child_id))
        .one(db)
        .await?;

    let class_id = if let Some(a) = current {
        a.class_id
    } else {
        let classes = Class::find()
            .order_by_asc(class::Column::Id)
            .all(db)
            .await?;
        find_class_for_age(&classes, child.age)?.id
    };

    Ok(section_loads(db, class_id)
        .await?
        .into_iter()
        .map(|load| SectionOption {
            is_full: load.is_full(),
            section_id: load.section.id,
            display_name: load.section.display_name,
            current_count: load.current_count,
            max_capacity: load.section.max_capacity,
        })
        .collect())
}

async fn reject(txn: DatabaseTransaction, reason: &str) -> Result<SectionChangeOutcome> {
    txn.rollback().await?;
    info!("Section change rejected: {reason}");
    Ok(SectionChangeOutcome::rejected(reason))
}

/// Moves a child into another section of the same class.
///
/// The capacity check and the write share one transaction. Business-rule
/// failures come back as `success = false` with a reason.
#[instrument(skip(db))]
pub async fn update_child_section(
    db: &DatabaseConnection,
    child_id: i64,
    new_section_id: i64,
) -> Result<SectionChangeOutcome> {
    let txn = db.begin().await?;

    let Some(child) = Registration::find_by_id(child_id).one(&txn).await? else {
        return reject(txn, "Child not found").await;
    };
    let Some(target) = Section::find_by_id(new_section_id).one(&txn).await? else {
        return reject(txn, "Section not found").await;
    };

    let current = Allocation::find()
        .filter(allocation::Column::RegistrationId.eq(child_id))
        .one(&txn)
        .await?;

    if let Some(ref a) = current {
        if a.section_id == new_section_id {
            txn.rollback().await?;
            return Ok(SectionChangeOutcome::ok());
        }
        if a.class_id != target.class_id {
            return reject(txn, "Section belongs to a different class").await;
        }
    } else {
        let class_row = Class::find_by_id(target.class_id).one(&txn).await?;
        if !class_row.is_some_and(|c| c.accepts_age(child.age)) {
            return reject(txn, "Child's age is outside this class").await;
        }
    }

    let occupied = Allocation::find()
        .filter(allocation::Column::SectionId.eq(new_section_id))
        .count(&txn)
        .await?;
    if occupied >= u64::try_from(target.max_capacity).unwrap_or(0) {
        return reject(txn, "Section is full").await;
    }

    if let Some(a) = current {
        let mut active_model: allocation::ActiveModel = a.into();
        active_model.section_id = Set(new_section_id);
        active_model.created_at = Set(Utc::now());
        active_model.update(&txn).await?;
    } else {
        allocation::ActiveModel {
            registration_id: Set(child_id),
            class_id: Set(target.class_id),
            section_id: Set(new_section_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    txn.commit().await?;
    info!("Moved child {child_id} to {}", target.display_name);
    Ok(SectionChangeOutcome::ok())
}

/// Like [`update_child_section`], but a rejected change is an error.
pub async fn reassign_section(db: &DatabaseConnection, child_id: i64, new_section_id: i64) -> Result<()> {
    let outcome = update_child_section(db, child_id, new_section_id).await?;
    if outcome.success {
        Ok(())
    } else {
        Err(Error::SectionChangeRejected {
            reason: outcome
                .error
                .unwrap_or_else(|| "Failed to update section".to_string()),
        })
    }
}
