//! Admin routes. Every handler first checks the admin role claim.

use super::AppState;
use crate::{
    core::{
        assignment::{
            AssignmentField, AssignmentRow, assign_teacher, list_assignments, list_sections,
            list_teachers, sort_assignments, total_students,
        },
        dashboard::{
            ChildDetails, ClassOverview, RosterField, SectionOption, available_sections,
            class_overview, reassign_section, search_children, section_roster, sort_roster,
        },
        report::{DailyCount, daily_registration_counts, export_registrations_csv},
        sorting::{SortDirection, SortState},
    },
    entities::{section, section_teacher, teacher},
    errors::Result,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// `?sort=<field>&dir=<asc|desc>`; no `sort` keeps the server order.
#[derive(Debug, Deserialize)]
pub struct SortQuery<F> {
    /// Column to sort by
    pub sort: Option<F>,
    /// Defaults to ascending
    pub dir: Option<SortDirection>,
}

impl<F: Copy + PartialEq> SortQuery<F> {
    fn state(&self) -> Option<SortState<F>> {
        self.sort
            .map(|field| SortState::new(field, self.dir.unwrap_or_default()))
    }
}

/// `?q=<term>` plus optional roster sort.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Free-text term; blank returns nothing
    #[serde(default)]
    pub q: String,
    /// Roster column to sort by
    pub sort: Option<RosterField>,
    /// Defaults to ascending
    pub dir: Option<SortDirection>,
}

/// Body of a section reassignment.
#[derive(Debug, Deserialize)]
pub struct MoveChildRequest {
    /// Target section
    pub section_id: i64,
}

/// `?date=YYYY-MM-DD` for the registration export.
#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    /// Defaults to today (UTC)
    pub date: Option<NaiveDate>,
}

/// Body of a teacher assignment.
#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub teacher_id: i64,
    pub section_id: i64,
    /// Lead teacher of the section
    #[serde(default)]
    pub is_primary: bool,
}

/// Assignment listing with the summed student count.
#[derive(Debug, Serialize)]
pub struct AssignmentsResponse {
    /// Assignment rows in the requested order
    pub rows: Vec<AssignmentRow>,
    /// Sum of `student_count` over every row
    pub total_students: u64,
}

/// `GET /api/admin/classes`
pub async fn classes(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ClassOverview>>> {
    state.admin(&headers).await?;
    class_overview(&state.db).await.map(Json)
}

/// `GET /api/admin/sections/:id/children`
pub async fn section_children(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(section_id): Path<i64>,
    Query(query): Query<SortQuery<RosterField>>,
) -> Result<Json<Vec<ChildDetails>>> {
    state.admin(&headers).await?;
    let mut rows = section_roster(&state.db, section_id).await?;
    if let Some(sort) = query.state() {
        sort_roster(&mut rows, sort);
    }
    Ok(Json(rows))
}

/// `GET /api/admin/search`
pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ChildDetails>>> {
    state.admin(&headers).await?;
    let mut rows = search_children(&state.db, &query.q).await?;
    if let Some(field) = query.sort {
        sort_roster(&mut rows, SortState::new(field, query.dir.unwrap_or_default()));
    }
    Ok(Json(rows))
}

/// `GET /api/admin/children/:id/sections`
pub async fn child_sections(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(child_id): Path<i64>,
) -> Result<Json<Vec<SectionOption>>> {
    state.admin(&headers).await?;
    available_sections(&state.db, child_id).await.map(Json)
}

/// `PUT /api/admin/children/:id/section`
pub async fn move_child(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(child_id): Path<i64>,
    Json(request): Json<MoveChildRequest>,
) -> Result<StatusCode> {
    let admin = state.admin(&headers).await?;
    reassign_section(&state.db, child_id, request.section_id).await?;
    info!("{} moved child {child_id} to section {}", admin.phone, request.section_id);
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/admin/registrations/daily`
pub async fn daily_counts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<DailyCount>>> {
    state.admin(&headers).await?;
    daily_registration_counts(&state.db).await.map(Json)
}

/// `GET /api/admin/registrations/export`
pub async fn export(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse> {
    state.admin(&headers).await?;
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let (filename, bytes) = export_registrations_csv(&state.db, date).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    ))
}

/// `GET /api/admin/assignments`
pub async fn assignments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SortQuery<AssignmentField>>,
) -> Result<Json<AssignmentsResponse>> {
    state.admin(&headers).await?;
    let mut rows = list_assignments(&state.db).await?;
    if let Some(sort) = query.state() {
        sort_assignments(&mut rows, sort);
    }
    Ok(Json(AssignmentsResponse {
        total_students: total_students(&rows),
        rows,
    }))
}

/// `POST /api/admin/assignments`
pub async fn create_assignment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AssignRequest>,
) -> Result<(StatusCode, Json<section_teacher::Model>)> {
    state.admin(&headers).await?;
    let row = assign_teacher(
        state.db.as_ref(),
        request.teacher_id,
        request.section_id,
        request.is_primary,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/admin/teachers`
pub async fn teachers(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<teacher::Model>>> {
    state.admin(&headers).await?;
    list_teachers(&state.db).await.map(Json)
}

/// `GET /api/admin/sections`
pub async fn sections(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<section::Model>>> {
    state.admin(&headers).await?;
    list_sections(&state.db).await.map(Json)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        api::test_support::{ADMIN_PHONE, send, test_state},
        core::auth::Role,
        test_utils::*,
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, header::AUTHORIZATION},
    };
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_teacher_session_cannot_open_admin_routes() -> Result<()> {
        let db = setup_test_db().await?;
        let fixture = seed_test_event(&db).await?;
        let token =
            create_test_session(&db, Role::Teacher, &fixture.mary.phone, Some(fixture.mary.id))
                .await?;
        let (state, _) = test_state(db);

        let (status, body) = send(&state, Method::GET, "/api/admin/classes", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "You do not have access to this page.");
        Ok(())
    }

    #[tokio::test]
    async fn test_section_roster_sorted_by_age_desc() -> Result<()> {
        let db = setup_test_db().await?;
        let fixture = seed_test_event(&db).await?;
        let asha = create_test_registration_aged(&db, "Asha", 4, "T-1").await?;
        let zara = create_test_registration_aged(&db, "Zara", 6, "T-2").await?;
        allocate_directly(&db, asha.id, &fixture.beginners_a).await?;
        allocate_directly(&db, zara.id, &fixture.beginners_a).await?;
        let token = create_test_session(&db, Role::Admin, ADMIN_PHONE, None).await?;
        let (state, _) = test_state(db);

        let uri = format!(
            "/api/admin/sections/{}/children?sort=age&dir=desc",
            fixture.beginners_a.id
        );
        let (status, body) = send(&state, Method::GET, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["full_name"], "Zara K Thomas");
        assert_eq!(body[1]["full_name"], "Asha K Thomas");
        assert_eq!(body[0]["teacher_name"], "Mary");
        Ok(())
    }

    #[tokio::test]
    async fn test_move_child_into_full_section_is_conflict() -> Result<()> {
        let db = setup_test_db().await?;
        let fixture = seed_test_event(&db).await?;
        let ravi = create_test_registration_aged(&db, "Ravi", 8, "T-1").await?;
        let rhea = create_test_registration_aged(&db, "Rhea", 8, "T-2").await?;
        allocate_directly(&db, ravi.id, &fixture.primary_a).await?;
        let token = create_test_session(&db, Role::Admin, ADMIN_PHONE, None).await?;
        let (state, _) = test_state(db);

        let (status, options) = send(
            &state,
            Method::GET,
            &format!("/api/admin/children/{}/sections", rhea.id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(options[0]["is_full"], true);

        let (status, body) = send(
            &state,
            Method::PUT,
            &format!("/api/admin/children/{}/section", rhea.id),
            Some(&token),
            Some(json!({ "section_id": fixture.primary_a.id })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Section is full");
        Ok(())
    }

    #[tokio::test]
    async fn test_assignments_round_trip() -> Result<()> {
        let db = setup_test_db().await?;
        let fixture = seed_test_event(&db).await?;
        let token = create_test_session(&db, Role::Admin, ADMIN_PHONE, None).await?;
        let (state, _) = test_state(db);
        let request = json!({
            "teacher_id": fixture.john.id,
            "section_id": fixture.primary_a.id,
        });

        let (status, created) = send(
            &state,
            Method::POST,
            "/api/admin/assignments",
            Some(&token),
            Some(request.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["is_primary"], false);

        let (status, _) = send(
            &state,
            Method::POST,
            "/api/admin/assignments",
            Some(&token),
            Some(request),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, listed) = send(
            &state,
            Method::GET,
            "/api/admin/assignments?sort=teacher_name&dir=desc",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["rows"][0]["teacher_name"], "Mary");
        assert_eq!(listed["rows"][1]["teacher_name"], "John");
        assert_eq!(listed["total_students"], 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_export_sets_download_headers() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_registration_aged(&db, "Asha", 5, "T-1").await?;
        let token = create_test_session(&db, Role::Admin, ADMIN_PHONE, None).await?;
        let (state, _) = test_state(db);

        let request = Request::builder()
            .uri("/api/admin/registrations/export?date=2025-05-03")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = crate::api::router(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"vbs-registrations-2025-05-03.csv\""
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            String::from_utf8(bytes.to_vec()).unwrap(),
            "Child Name,Age,Parent Name,Phone,Class-Section,Date\n"
        );
        Ok(())
    }
}
