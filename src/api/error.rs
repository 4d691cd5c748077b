//! HTTP mapping of [`Error`].
//!
//! Every failure becomes `{"error": "<banner message>"}` with a status code
//! derived from the variant. Infrastructure failures are logged in full and
//! reported to the client with the generic message only.

use crate::errors::Error;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

impl Error {
    /// Status code returned for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NoEligibleClass { .. } | Self::ClassHasNoSections { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::DuplicateRegistration { .. }
            | Self::AlreadyAssigned { .. }
            | Self::SectionFull { .. }
            | Self::SectionChangeRejected { .. }
            | Self::InvalidStep { .. } => StatusCode::CONFLICT,
            Self::RegistrationNotFound { .. }
            | Self::SectionNotFound { .. }
            | Self::TeacherNotFound { .. }
            | Self::DraftNotFound => StatusCode::NOT_FOUND,
            Self::InvalidCode | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::UnknownTeacherPhone | Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Dispatch { .. } => StatusCode::BAD_GATEWAY,
            Self::Config { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::EnvVar(_)
            | Self::IntConversion(_)
            | Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {self}");
        }

        let body = match &self {
            Self::DuplicateRegistration { acknowledgement_id } => json!({
                "error": self.user_message(),
                "acknowledgement_id": acknowledgement_id,
            }),
            Self::Validation { field, .. } => json!({
                "error": self.user_message(),
                "field": field,
            }),
            _ => json!({ "error": self.user_message() }),
        };

        (status, Json(body)).into_response()
    }
}
