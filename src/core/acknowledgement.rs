//! Duplicate detection and acknowledgement id generation.
//!
//! The acknowledgement sequence lives in the `system_state` table under
//! [`ACKNOWLEDGEMENT_SEQ_KEY`]. Generating an id inside the registration
//! transaction means a rolled-back registration never consumes a number.

use crate::{
    entities::{Registration, SystemState, registration, system_state},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*};
use tracing::{debug, instrument};

/// `system_state` key holding the last issued sequence number.
pub const ACKNOWLEDGEMENT_SEQ_KEY: &str = "acknowledgement_seq";

/// Returns the acknowledgement id of an existing current-year registration
/// with the same first name and date of birth, if there is one.
#[instrument(skip(db))]
pub async fn check_duplicate_registration<C>(
    db: &C,
    first_name: &str,
    date_of_birth: NaiveDate,
) -> Result<Option<String>>
where
    C: ConnectionTrait,
{
    let existing: Option<String> = Registration::find()
        .select_only()
        .column(registration::Column::AcknowledgementId)
        .filter(registration::Column::FirstName.eq(first_name))
        .filter(registration::Column::DateOfBirth.eq(date_of_birth))
        .order_by_asc(registration::Column::Id)
        .into_tuple()
        .one(db)
        .await?;

    if let Some(ref id) = existing {
        debug!("Found existing registration {id}");
    }
    Ok(existing)
}

/// Formats sequence number `seq` under `prefix`, e.g. `VBS2025-0007`.
#[must_use]
pub fn format_acknowledgement_id(prefix: &str, seq: u32) -> String {
    format!("{prefix}-{seq:04}")
}

/// Advances the acknowledgement sequence and returns the new id.
///
/// Call with the registration transaction so the counter and the row commit
/// together.
#[instrument(skip(db))]
pub async fn generate_acknowledgement_id<C>(db: &C, prefix: &str) -> Result<String>
where
    C: ConnectionTrait,
{
    let now = Utc::now().naive_utc();
    let existing = SystemState::find()
        .filter(system_state::Column::Key.eq(ACKNOWLEDGEMENT_SEQ_KEY))
        .one(db)
        .await?;

    let next = if let Some(state) = existing {
        let last: u32 = state.value.parse().map_err(|e| Error::Config {
            message: format!("Corrupt acknowledgement sequence {:?}: {e}", state.value),
        })?;
        let next = last + 1;
        let mut active_model: system_state::ActiveModel = state.into();
        active_model.value = Set(next.to_string());
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
        next
    } else {
        system_state::ActiveModel {
            key: Set(ACKNOWLEDGEMENT_SEQ_KEY.to_string()),
            value: Set("1".to_string()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
        1
    };

    Ok(format_acknowledgement_id(prefix, next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_format_acknowledgement_id() {
        assert_eq!(format_acknowledgement_id("VBS2025", 7), "VBS2025-0007");
        assert_eq!(format_acknowledgement_id("VBS2025", 12345), "VBS2025-12345");
    }

    #[tokio::test]
    async fn test_generate_acknowledgement_id_is_sequential() -> Result<()> {
        let db = setup_test_db().await?;

        assert_eq!(generate_acknowledgement_id(&db, "VBS").await?, "VBS-0001");
        assert_eq!(generate_acknowledgement_id(&db, "VBS").await?, "VBS-0002");
        assert_eq!(generate_acknowledgement_id(&db, "VBS").await?, "VBS-0003");
        Ok(())
    }

    #[tokio::test]
    async fn test_check_duplicate_registration() -> Result<()> {
        let db = setup_test_db().await?;
        let dob = test_date(2019, 3, 14);
        let existing = create_test_registration(&db, "Asha", dob, "VBS2025-0001").await?;

        let found = check_duplicate_registration(&db, "Asha", dob).await?;
        assert_eq!(found, Some(existing.acknowledgement_id));

        let other_dob = check_duplicate_registration(&db, "Asha", test_date(2019, 3, 15)).await?;
        assert_eq!(other_dob, None);

        let other_name = check_duplicate_registration(&db, "Anil", dob).await?;
        assert_eq!(other_name, None);
        Ok(())
    }
}
