//! Registration workflow - the parent-facing state machine.
//!
//! The flow moves through three steps:
//! - `Form`: collect the child's details, either typed in or pre-filled from
//!   last year's roster. Submitting runs local validation and a duplicate
//!   check; nothing is written.
//! - `Payment`: the parent picks cash or UPI. Picking a method is what
//!   persists the registration.
//! - `Complete`: the acknowledgement id (and allocation, when enabled) is
//!   shown.
//!
//! Persisting goes through [`register_child`], which performs the duplicate
//! re-check, id generation, insert and allocation in one transaction. A
//! failure at any point leaves the flow on its current step.

use crate::{
    config::EventSettings,
    core::{
        acknowledgement::{check_duplicate_registration, generate_acknowledgement_id},
        allocation::{AllocationResult, allocate_child, calculate_age},
        roster::{ReturningSearch, search_prior_roster},
        validation::{NewRegistration, RegistrationForm, validate_form},
    },
    entities::{prior_roster, registration},
    errors::{Error, Result},
};
use chrono::{Local, Utc};
use sea_orm::{DatabaseTransaction, Set, SqlErr, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Payment status recorded when a method is chosen.
pub const PAYMENT_STATUS_COMPLETED: &str = "completed";

/// Current step of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStep {
    Form,
    Payment,
    Complete,
}

impl RegistrationStep {
    /// Lower-case step name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Form => "form",
            Self::Payment => "payment",
            Self::Complete => "complete",
        }
    }
}

/// New child vs. child found in last year's roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationMode {
    New,
    Returning,
}

/// The two mutually exclusive payment methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    /// Electronic payment by scanning the team's QR code
    Upi,
}

impl PaymentMethod {
    /// Value stored in `registrations.payment_method`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Upi => "upi",
        }
    }

    /// What the parent has to do next.
    #[must_use]
    pub const fn instructions(self) -> &'static str {
        match self {
            Self::Cash => {
                "Please pay cash to VBS team in person. Keep your Acknowledgement ID for reference."
            }
            Self::Upi => "Please scan the Payment QR code from VBS team to complete payment.",
        }
    }
}

/// Proof of registration shown on the `Complete` step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Acknowledgement {
    pub acknowledgement_id: String,
    pub payment_method: PaymentMethod,
    pub instructions: String,
    pub allocation: Option<AllocationResult>,
}

/// One parent's pass through the registration screens.
#[derive(Debug, Clone)]
pub struct RegistrationFlow {
    step: RegistrationStep,
    mode: RegistrationMode,
    search: Option<ReturningSearch>,
    found_child: Option<prior_roster::Model>,
    pending: Option<NewRegistration>,
    acknowledgement: Option<Acknowledgement>,
}

impl Default for RegistrationFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrationFlow {
    /// A fresh flow on the `Form` step in `New` mode.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            step: RegistrationStep::Form,
            mode: RegistrationMode::New,
            search: None,
            found_child: None,
            pending: None,
            acknowledgement: None,
        }
    }

    #[must_use]
    pub const fn step(&self) -> RegistrationStep {
        self.step
    }

    #[must_use]
    pub const fn mode(&self) -> RegistrationMode {
        self.mode
    }

    #[must_use]
    pub const fn found_child(&self) -> Option<&prior_roster::Model> {
        self.found_child.as_ref()
    }

    #[must_use]
    pub const fn pending(&self) -> Option<&NewRegistration> {
        self.pending.as_ref()
    }

    #[must_use]
    pub const fn acknowledgement(&self) -> Option<&Acknowledgement> {
        self.acknowledgement.as_ref()
    }

    fn expect_step(&self, expected: RegistrationStep) -> Result<()> {
        if self.step == expected {
            Ok(())
        } else {
            Err(Error::InvalidStep {
                expected: expected.as_str(),
                actual: self.step.as_str(),
            })
        }
    }

    /// Switches between new and returning registration, clearing any lookup.
    pub fn switch_mode(&mut self, mode: RegistrationMode) -> Result<()> {
        self.expect_step(RegistrationStep::Form)?;
        self.mode = mode;
        self.search = None;
        self.found_child = None;
        Ok(())
    }

    /// Looks a child up in last year's roster.
    ///
    /// A single match pre-fills the form straight away; several matches are
    /// kept for [`Self::select_returning`]. A blank name does nothing.
    pub async fn search_returning(
        &mut self,
        db: &DatabaseConnection,
        name: &str,
    ) -> Result<Option<&ReturningSearch>> {
        self.expect_step(RegistrationStep::Form)?;
        self.mode = RegistrationMode::Returning;

        let Some(outcome) = search_prior_roster(db, name).await? else {
            return Ok(None);
        };

        self.found_child = match &outcome {
            ReturningSearch::Single(child) => Some(child.clone()),
            ReturningSearch::NotFound | ReturningSearch::Multiple(_) => None,
        };
        self.search = Some(outcome);
        Ok(self.search.as_ref())
    }

    /// Picks one child out of a multi-match search.
    pub fn select_returning(&mut self, child_id: i64) -> Result<&prior_roster::Model> {
        self.expect_step(RegistrationStep::Form)?;
        let picked = match &self.search {
            Some(ReturningSearch::Multiple(children)) => {
                children.iter().find(|c| c.id == child_id).cloned()
            }
            Some(ReturningSearch::Single(child)) if child.id == child_id => Some(child.clone()),
            _ => None,
        };

        let child =
            picked.ok_or_else(|| Error::validation("child_id", "Please pick a child from the list"))?;
        self.search = None;
        Ok(&*self.found_child.insert(child))
    }

    /// The form as it should appear: pre-filled from a found child, else empty.
    #[must_use]
    pub fn prefilled_form(&self) -> RegistrationForm {
        self.found_child
            .as_ref()
            .map_or_else(RegistrationForm::default, |child| RegistrationForm {
                first_name: child.first_name.clone(),
                last_name: child.last_name.clone(),
                surname: child.surname.clone(),
                date_of_birth: child.date_of_birth.format("%Y-%m-%d").to_string(),
                parent_name: child.parent_name.clone(),
                phone_number: child.phone_number.clone(),
                allergies: child.allergies.clone(),
                medical_notes: child.medical_notes.clone(),
            })
    }

    /// Validates the form and checks for an existing registration.
    ///
    /// On success the flow moves to `Payment`. A duplicate aborts with the
    /// existing acknowledgement id and the flow stays on `Form`.
    #[instrument(skip(self, db, form))]
    pub async fn submit_form(&mut self, db: &DatabaseConnection, form: &RegistrationForm) -> Result<()> {
        self.expect_step(RegistrationStep::Form)?;
        let registration = validate_form(form, Local::now().date_naive())?;

        if let Some(acknowledgement_id) = check_duplicate_registration(
            db,
            &registration.first_name,
            registration.date_of_birth,
        )
        .await?
        {
            info!("Duplicate registration rejected ({acknowledgement_id})");
            return Err(Error::DuplicateRegistration { acknowledgement_id });
        }

        self.pending = Some(registration);
        self.step = RegistrationStep::Payment;
        Ok(())
    }

    /// Returns from `Payment` to `Form`, keeping the entered details.
    pub fn back_to_form(&mut self) -> Result<()> {
        self.expect_step(RegistrationStep::Payment)?;
        self.step = RegistrationStep::Form;
        Ok(())
    }

    /// Records the payment method, which persists the registration.
    pub async fn choose_payment(
        &mut self,
        db: &DatabaseConnection,
        event: &EventSettings,
        method: PaymentMethod,
    ) -> Result<&Acknowledgement> {
        self.expect_step(RegistrationStep::Payment)?;
        let pending = self.pending.as_ref().ok_or(Error::InvalidStep {
            expected: RegistrationStep::Payment.as_str(),
            actual: RegistrationStep::Form.as_str(),
        })?;

        let acknowledgement = register_child(db, pending, method, event).await?;
        self.step = RegistrationStep::Complete;
        Ok(&*self.acknowledgement.insert(acknowledgement))
    }
}

async fn abandon(txn: DatabaseTransaction, err: Error) -> Result<Acknowledgement> {
    txn.rollback().await?;
    Err(err)
}

/// Persists a registration atomically.
///
/// Within one transaction: re-check for a duplicate, compute the age,
/// generate the acknowledgement id, insert the row and, when enabled,
/// allocate a class and section. Any failure rolls everything back,
/// including the acknowledgement sequence.
#[instrument(skip(db, registration, event), fields(first_name = %registration.first_name))]
pub async fn register_child(
    db: &DatabaseConnection,
    registration: &NewRegistration,
    method: PaymentMethod,
    event: &EventSettings,
) -> Result<Acknowledgement> {
    let txn = db.begin().await?;

    if let Some(acknowledgement_id) =
        check_duplicate_registration(&txn, &registration.first_name, registration.date_of_birth)
            .await?
    {
        return abandon(txn, Error::DuplicateRegistration { acknowledgement_id }).await;
    }

    let acknowledgement_id =
        generate_acknowledgement_id(&txn, &event.acknowledgement_prefix).await?;
    let age = calculate_age(registration.date_of_birth);

    let inserted = registration::ActiveModel {
        first_name: Set(registration.first_name.clone()),
        last_name: Set(registration.last_name.clone()),
        surname: Set(registration.surname.clone()),
        date_of_birth: Set(registration.date_of_birth),
        parent_name: Set(registration.parent_name.clone()),
        phone_number: Set(registration.phone_number.clone()),
        acknowledgement_id: Set(acknowledgement_id.clone()),
        payment_method: Set(method.as_str().to_string()),
        payment_status: Set(PAYMENT_STATUS_COMPLETED.to_string()),
        age: Set(age),
        allergies: Set(registration.allergies.clone()),
        medical_notes: Set(registration.medical_notes.clone()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await;

    let row = match inserted {
        Ok(row) => row,
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            // Another session won the race between the check and the insert.
            warn!("Unique violation on registration insert: {e}");
            txn.rollback().await?;
            let existing =
                check_duplicate_registration(db, &registration.first_name, registration.date_of_birth)
                    .await?;
            return Err(existing.map_or(Error::Database(e), |acknowledgement_id| {
                Error::DuplicateRegistration { acknowledgement_id }
            }));
        }
        Err(e) => return abandon(txn, e.into()).await,
    };

    let allocation = if event.allocate_on_register {
        match allocate_child(&txn, row.id, age).await {
            Ok(result) => Some(result),
            Err(e) => return abandon(txn, e).await,
        }
    } else {
        None
    };

    txn.commit().await?;
    info!("Registered {} as {acknowledgement_id}", row.full_name());

    Ok(Acknowledgement {
        acknowledgement_id,
        payment_method: method,
        instructions: method.instructions().to_string(),
        allocation,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::{Allocation, Registration};
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_full_flow_issues_acknowledgement() -> Result<()> {
        let db = setup_test_db().await?;
        let fixture = seed_test_event(&db).await?;
        let event = test_event_settings();

        let mut flow = RegistrationFlow::new();
        flow.submit_form(&db, &test_form("Asha", dob_for_age(5))).await?;
        assert_eq!(flow.step(), RegistrationStep::Payment);
        // Nothing is written before a payment method is chosen
        assert_eq!(Registration::find().count(&db).await?, 0);

        let ack = flow.choose_payment(&db, &event, PaymentMethod::Cash).await?.clone();
        assert_eq!(flow.step(), RegistrationStep::Complete);
        assert_eq!(ack.acknowledgement_id, "VBS2025-0001");
        assert_eq!(ack.payment_method, PaymentMethod::Cash);
        let allocation = ack.allocation.unwrap();
        assert_eq!(allocation.section_id, fixture.beginners_a.id);
        assert_eq!(allocation.teacher_name.as_deref(), Some("Mary"));

        let stored = Registration::find().one(&db).await?.unwrap();
        assert_eq!(stored.age, 5);
        assert_eq!(stored.payment_method, "cash");
        assert_eq!(stored.payment_status, PAYMENT_STATUS_COMPLETED);
        Ok(())
    }

    #[tokio::test]
    async fn test_second_submission_returns_existing_acknowledgement() -> Result<()> {
        let db = setup_test_db().await?;
        seed_test_event(&db).await?;
        let event = test_event_settings();
        let dob = dob_for_age(5);

        let mut first = RegistrationFlow::new();
        first.submit_form(&db, &test_form("Asha", dob)).await?;
        let issued = first
            .choose_payment(&db, &event, PaymentMethod::Upi)
            .await?
            .acknowledgement_id
            .clone();

        let mut second = RegistrationFlow::new();
        let mut form = test_form("Asha", dob);
        form.parent_name = "Someone Else".to_string();
        let err = second.submit_form(&db, &form).await.unwrap_err();

        assert!(matches!(
            err,
            Error::DuplicateRegistration { ref acknowledgement_id } if *acknowledgement_id == issued
        ));
        assert_eq!(second.step(), RegistrationStep::Form);
        assert_eq!(Registration::find().count(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_register_child_rechecks_duplicates() -> Result<()> {
        let db = setup_test_db().await?;
        seed_test_event(&db).await?;
        let event = test_event_settings();
        let dob = dob_for_age(5);

        // Two flows pass the optimistic check before either persists
        let mut a = RegistrationFlow::new();
        let mut b = RegistrationFlow::new();
        a.submit_form(&db, &test_form("Asha", dob)).await?;
        b.submit_form(&db, &test_form("Asha", dob)).await?;

        let issued = a
            .choose_payment(&db, &event, PaymentMethod::Cash)
            .await?
            .acknowledgement_id
            .clone();
        let err = b
            .choose_payment(&db, &event, PaymentMethod::Cash)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::DuplicateRegistration { ref acknowledgement_id } if *acknowledgement_id == issued
        ));
        assert_eq!(b.step(), RegistrationStep::Payment);
        assert_eq!(Registration::find().count(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_allocation_rolls_back_registration() -> Result<()> {
        let db = setup_test_db().await?;
        seed_test_event(&db).await?;
        let event = test_event_settings();

        let mut too_old = RegistrationFlow::new();
        too_old.submit_form(&db, &test_form("Mathew", dob_for_age(14))).await?;
        let err = too_old
            .choose_payment(&db, &event, PaymentMethod::Cash)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoEligibleClass { age: 14 }));
        assert_eq!(too_old.step(), RegistrationStep::Payment);
        assert_eq!(Registration::find().count(&db).await?, 0);

        // The sequence number was rolled back with the row
        let mut next = RegistrationFlow::new();
        next.submit_form(&db, &test_form("Asha", dob_for_age(5))).await?;
        let ack = next.choose_payment(&db, &event, PaymentMethod::Cash).await?;
        assert_eq!(ack.acknowledgement_id, "VBS2025-0001");
        Ok(())
    }

    #[tokio::test]
    async fn test_registration_without_allocation() -> Result<()> {
        let db = setup_test_db().await?;
        let mut event = test_event_settings();
        event.allocate_on_register = false;

        let mut flow = RegistrationFlow::new();
        flow.submit_form(&db, &test_form("Asha", dob_for_age(14))).await?;
        let ack = flow.choose_payment(&db, &event, PaymentMethod::Upi).await?;
        assert!(ack.allocation.is_none());
        assert_eq!(Allocation::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_step_guards() -> Result<()> {
        let db = setup_test_db().await?;
        let event = test_event_settings();
        let mut flow = RegistrationFlow::new();

        let err = flow
            .choose_payment(&db, &event, PaymentMethod::Cash)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStep { expected: "payment", actual: "form" }));
        assert!(flow.back_to_form().is_err());

        flow.submit_form(&db, &test_form("Asha", dob_for_age(5))).await?;
        flow.back_to_form()?;
        assert_eq!(flow.step(), RegistrationStep::Form);
        assert_eq!(flow.pending().unwrap().first_name, "Asha");
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_form_stays_on_form_step() -> Result<()> {
        let db = setup_test_db().await?;
        let mut flow = RegistrationFlow::new();
        let mut form = test_form("Asha", dob_for_age(5));
        form.phone_number = "12345".to_string();

        assert!(matches!(
            flow.submit_form(&db, &form).await,
            Err(Error::Validation { .. })
        ));
        assert_eq!(flow.step(), RegistrationStep::Form);
        Ok(())
    }

    #[tokio::test]
    async fn test_returning_search_prefills_form() -> Result<()> {
        let db = setup_test_db().await?;
        let dob = test_date(2018, 6, 1);
        let ravi = create_test_prior_child(&db, "Ravi", dob).await?;
        create_test_prior_child(&db, "Asha", test_date(2019, 3, 14)).await?;
        create_test_prior_child(&db, "Ashwin", test_date(2018, 7, 2)).await?;

        let mut flow = RegistrationFlow::new();
        let outcome = flow.search_returning(&db, "Ravi").await?.cloned();
        assert!(matches!(outcome, Some(ReturningSearch::Single(_))));
        assert_eq!(flow.mode(), RegistrationMode::Returning);
        let form = flow.prefilled_form();
        assert_eq!(form.first_name, "Ravi");
        assert_eq!(form.date_of_birth, "2018-06-01");
        assert_eq!(form.phone_number, ravi.phone_number);

        let outcome = flow.search_returning(&db, "ash").await?.cloned();
        let Some(ReturningSearch::Multiple(children)) = outcome else {
            panic!("expected multiple matches");
        };
        assert!(flow.found_child().is_none());
        let picked = flow.select_returning(children[1].id)?.clone();
        assert_eq!(picked.first_name, "Ashwin");
        assert_eq!(flow.prefilled_form().first_name, "Ashwin");

        flow.switch_mode(RegistrationMode::New)?;
        assert!(flow.found_child().is_none());
        assert_eq!(flow.prefilled_form(), RegistrationForm::default());
        Ok(())
    }
}
