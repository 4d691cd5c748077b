//! Signed-in teacher routes.

use super::AppState;
use crate::{
    core::teacher_dashboard::{TeacherSection, teacher_classes},
    errors::Result,
};
use axum::{Json, extract::State, http::HeaderMap};

/// `GET /api/teacher/dashboard`
pub async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<TeacherSection>>> {
    let teacher_id = state.principal(&headers).await?.require_teacher()?;
    teacher_classes(&state.db, teacher_id).await.map(Json)
}
