//! One-time-code sign-in routes.

use super::AppState;
use crate::{
    core::auth::{IssuedSession, request_code, verify_code},
    errors::Result,
};
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

/// Body of a code request.
#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    /// 10-digit number, with or without `+91`
    pub phone: String,
}

/// Reply to a code request.
#[derive(Debug, Serialize)]
pub struct OtpResponse {
    /// Normalised number the code was sent to
    pub phone: String,
}

/// Body of a code verification.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// Same number the code was requested for
    pub phone: String,
    /// The 6-digit code
    pub code: String,
}

/// `POST /api/auth/otp`
pub async fn request_otp(
    State(state): State<AppState>,
    Json(request): Json<OtpRequest>,
) -> Result<Json<OtpResponse>> {
    let phone = request_code(
        &state.db,
        state.otp.as_ref(),
        &state.config.auth,
        &request.phone,
    )
    .await?;
    Ok(Json(OtpResponse { phone }))
}

/// `POST /api/auth/verify`
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<IssuedSession>> {
    verify_code(&state.db, &state.config.auth, &request.phone, &request.code)
        .await
        .map(Json)
}
