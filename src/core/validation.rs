//! Local validation of registration forms and sign-in inputs.
//!
//! These checks run before any database call. A failure names the offending
//! field so the caller can report it next to that field.

use crate::errors::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Message shown for a malformed mobile number.
pub const PHONE_MESSAGE: &str = "Please enter a valid 10-digit mobile number";

/// Registration form exactly as typed by the parent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationForm {
    pub first_name: String,
    pub last_name: String,
    pub surname: String,
    /// `YYYY-MM-DD`
    pub date_of_birth: String,
    pub parent_name: String,
    pub phone_number: String,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub medical_notes: Option<String>,
}

/// A validated registration, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRegistration {
    pub first_name: String,
    pub last_name: String,
    pub surname: String,
    pub date_of_birth: NaiveDate,
    pub parent_name: String,
    pub phone_number: String,
    pub allergies: Option<String>,
    pub medical_notes: Option<String>,
}

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(field, "Required"));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// True when `value` is exactly ten ASCII digits.
#[must_use]
pub fn is_ten_digit_phone(value: &str) -> bool {
    value.len() == 10 && value.bytes().all(|b| b.is_ascii_digit())
}

/// True when `value` is exactly six ASCII digits.
#[must_use]
pub fn is_six_digit_code(value: &str) -> bool {
    value.len() == 6 && value.bytes().all(|b| b.is_ascii_digit())
}

/// Validates a form against `today` and returns the normalised registration.
pub fn validate_form(form: &RegistrationForm, today: NaiveDate) -> Result<NewRegistration> {
    let first_name = required("first_name", &form.first_name)?;
    let last_name = required("last_name", &form.last_name)?;
    let surname = required("surname", &form.surname)?;
    let dob_text = required("date_of_birth", &form.date_of_birth)?;
    let parent_name = required("parent_name", &form.parent_name)?;
    let phone_number = required("phone_number", &form.phone_number)?;

    let date_of_birth = NaiveDate::parse_from_str(&dob_text, "%Y-%m-%d")
        .map_err(|_| Error::validation("date_of_birth", "Please enter a valid date"))?;
    if date_of_birth > today {
        return Err(Error::validation(
            "date_of_birth",
            "Date of birth cannot be in the future",
        ));
    }

    if !is_ten_digit_phone(&phone_number) {
        return Err(Error::validation("phone_number", PHONE_MESSAGE));
    }

    Ok(NewRegistration {
        first_name,
        last_name,
        surname,
        date_of_birth,
        parent_name,
        phone_number,
        allergies: optional(form.allergies.as_ref()),
        medical_notes: optional(form.medical_notes.as_ref()),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()
    }

    fn valid_form() -> RegistrationForm {
        RegistrationForm {
            first_name: " Asha ".to_string(),
            last_name: "K".to_string(),
            surname: "Thomas".to_string(),
            date_of_birth: "2019-03-14".to_string(),
            parent_name: "Rani Thomas".to_string(),
            phone_number: "9876543210".to_string(),
            allergies: Some("  ".to_string()),
            medical_notes: Some("Asthma".to_string()),
        }
    }

    #[test]
    fn test_validate_form_trims_and_parses() {
        let registration = validate_form(&valid_form(), today()).unwrap();
        assert_eq!(registration.first_name, "Asha");
        assert_eq!(
            registration.date_of_birth,
            NaiveDate::from_ymd_opt(2019, 3, 14).unwrap()
        );
        assert_eq!(registration.allergies, None);
        assert_eq!(registration.medical_notes.as_deref(), Some("Asthma"));
    }

    #[test]
    fn test_validate_form_requires_fields() {
        let mut form = valid_form();
        form.parent_name = "   ".to_string();
        let err = validate_form(&form, today()).unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "parent_name"));
    }

    #[test]
    fn test_validate_form_rejects_bad_phone() {
        for phone in ["98765", "98765432101", "98765abcde", "+919876543210"] {
            let mut form = valid_form();
            form.phone_number = phone.to_string();
            let err = validate_form(&form, today()).unwrap_err();
            assert_eq!(err.user_message(), PHONE_MESSAGE);
        }
    }

    #[test]
    fn test_validate_form_rejects_future_birthdate() {
        let mut form = valid_form();
        form.date_of_birth = "2025-05-02".to_string();
        assert!(validate_form(&form, today()).is_err());
    }

    #[test]
    fn test_code_pattern() {
        assert!(is_six_digit_code("012345"));
        assert!(!is_six_digit_code("12345"));
        assert!(!is_six_digit_code("12a456"));
    }
}
