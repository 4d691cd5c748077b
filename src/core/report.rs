//! Registration reports and the daily spreadsheet export.
//!
//! The export is a CSV file with a fixed column order. Values are quoted only
//! when they contain a delimiter, a quote or a line break.

use crate::{
    entities::{Allocation, Registration, Section, allocation, registration, section},
    errors::{Error, Result},
};
use chrono::{DateTime, Days, NaiveDate, Utc};
use sea_orm::{QueryOrder, QuerySelect, prelude::*};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, instrument};

/// Column headers of the export, in order.
pub const EXPORT_HEADERS: [&str; 6] = [
    "Child Name",
    "Age",
    "Parent Name",
    "Phone",
    "Class-Section",
    "Date",
];

/// Registrations submitted on one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

/// One exported registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub child_name: String,
    pub age: i32,
    pub parent_name: String,
    pub phone_number: String,
    pub class_section: Option<String>,
    pub registered_on: NaiveDate,
}

impl ReportRow {
    fn csv_line(&self) -> String {
        [
            csv_quote(&self.child_name),
            self.age.to_string(),
            csv_quote(&self.parent_name),
            csv_quote(&self.phone_number),
            csv_quote(self.class_section.as_deref().unwrap_or("")),
            self.registered_on.format("%d %b %Y").to_string(),
        ]
        .join(",")
    }
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Number of registrations per submission date, oldest first.
#[instrument(skip(db))]
pub async fn daily_registration_counts(db: &DatabaseConnection) -> Result<Vec<DailyCount>> {
    let timestamps: Vec<DateTime<Utc>> = Registration::find()
        .select_only()
        .column(registration::Column::CreatedAt)
        .into_tuple()
        .all(db)
        .await?;

    let mut per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for created_at in timestamps {
        *per_day.entry(created_at.date_naive()).or_default() += 1;
    }

    Ok(per_day
        .into_iter()
        .map(|(date, count)| DailyCount { date, count })
        .collect())
}

fn day_bounds(date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let next = date.checked_add_days(Days::new(1)).ok_or_else(|| {
        Error::validation("date", format!("{date} is out of range"))
    })?;
    Ok((
        date.and_time(chrono::NaiveTime::MIN).and_utc(),
        next.and_time(chrono::NaiveTime::MIN).and_utc(),
    ))
}

/// Registrations submitted on `date`, in submission order.
#[instrument(skip(db))]
pub async fn registration_report(db: &DatabaseConnection, date: NaiveDate) -> Result<Vec<ReportRow>> {
    let (start, end) = day_bounds(date)?;
    let registrations = Registration::find()
        .filter(registration::Column::CreatedAt.gte(start))
        .filter(registration::Column::CreatedAt.lt(end))
        .order_by_asc(registration::Column::CreatedAt)
        .order_by_asc(registration::Column::Id)
        .all(db)
        .await?;

    let ids: Vec<i64> = registrations.iter().map(|r| r.id).collect();
    let sections: HashMap<i64, section::Model> = Section::find()
        .all(db)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();
    let placed: HashMap<i64, String> = Allocation::find()
        .filter(allocation::Column::RegistrationId.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .filter_map(|a| {
            sections
                .get(&a.section_id)
                .map(|s| (a.registration_id, s.display_name.clone()))
        })
        .collect();

    Ok(registrations
        .into_iter()
        .map(|r| ReportRow {
            child_name: r.full_name(),
            age: r.age,
            parent_name: r.parent_name.clone(),
            phone_number: r.phone_number.clone(),
            class_section: placed.get(&r.id).cloned(),
            registered_on: r.created_at.date_naive(),
        })
        .collect())
}

/// File name used for a day's export.
#[must_use]
pub fn export_filename(date: NaiveDate) -> String {
    format!("vbs-registrations-{}.csv", date.format("%Y-%m-%d"))
}

/// Renders the day's registrations as CSV.
///
/// Returns the download file name and the file contents.
pub async fn export_registrations_csv(
    db: &DatabaseConnection,
    date: NaiveDate,
) -> Result<(String, Vec<u8>)> {
    let rows = registration_report(db, date).await?;

    let mut out = EXPORT_HEADERS.join(",");
    out.push('\n');
    for row in &rows {
        out.push_str(&row.csv_line());
        out.push('\n');
    }

    info!("Exported {} registrations for {date}", rows.len());
    Ok((export_filename(date), out.into_bytes()))
}
