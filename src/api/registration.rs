//! Parent-facing registration routes.
//!
//! A draft is created by submitting the form. It lives in memory until a
//! payment method is chosen, at which point the registration is persisted
//! and the draft is dropped.

use super::{AppState, DRAFT_TTL, Draft};
use crate::{
    core::{
        registration::{Acknowledgement, PaymentMethod, RegistrationFlow, RegistrationStep},
        roster::ReturningSearch,
        validation::{NewRegistration, RegistrationForm},
    },
    errors::{Error, Result},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Body of the returning-child search.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// Part of the child's first name
    pub name: String,
}

/// Search outcome plus the pre-filled form for a single match.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    /// `None` for a blank name
    pub result: Option<ReturningSearch>,
    /// Banner text, if any
    pub message: Option<&'static str>,
    /// Form pre-filled from a single match
    pub form: Option<RegistrationForm>,
}

/// Body of a form submission.
#[derive(Debug, Deserialize)]
pub struct SubmitDraftRequest {
    /// Resubmit an existing draft after going back
    #[serde(default)]
    pub draft_id: Option<Uuid>,
    /// Form as entered
    pub form: RegistrationForm,
}

/// Where a draft stands.
#[derive(Debug, Serialize)]
pub struct DraftResponse {
    pub draft_id: Uuid,
    pub step: RegistrationStep,
    /// Validated registration awaiting payment
    pub pending: Option<NewRegistration>,
}

/// Body of the payment step.
#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    /// Chosen payment method
    pub method: PaymentMethod,
}

fn draft_response(draft_id: Uuid, flow: &RegistrationFlow) -> DraftResponse {
    DraftResponse {
        draft_id,
        step: flow.step(),
        pending: flow.pending().cloned(),
    }
}

/// `POST /api/registrations/returning/search`
pub async fn search_returning(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let mut flow = RegistrationFlow::new();
    let result = flow.search_returning(&state.db, &request.name).await?.cloned();

    Ok(Json(SearchResponse {
        message: result.as_ref().and_then(ReturningSearch::message),
        form: flow.found_child().map(|_| flow.prefilled_form()),
        result,
    }))
}

/// `POST /api/registrations/drafts`
///
/// Validates the form and runs the duplicate check. A duplicate is a 409
/// carrying the existing acknowledgement id; nothing is stored.
pub async fn submit_draft(
    State(state): State<AppState>,
    Json(request): Json<SubmitDraftRequest>,
) -> Result<(StatusCode, Json<DraftResponse>)> {
    let existing = match request.draft_id {
        Some(id) => Some((id, take_draft(&state, id).await?)),
        None => None,
    };
    let (draft_id, mut flow) = existing.unwrap_or_else(|| (Uuid::new_v4(), RegistrationFlow::new()));

    let submitted = flow.submit_form(&state.db, &request.form).await;
    let response = draft_response(draft_id, &flow);
    // A brand-new draft is only kept once its form has been accepted
    if submitted.is_ok() || request.draft_id.is_some() {
        put_draft(&state, draft_id, flow).await;
    }
    submitted?;

    debug!("Draft {draft_id} ready for payment");
    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /api/registrations/drafts/:id/back`
pub async fn back_to_form(
    State(state): State<AppState>,
    Path(draft_id): Path<Uuid>,
) -> Result<Json<DraftResponse>> {
    let mut flow = take_draft(&state, draft_id).await?;
    let moved = flow.back_to_form();
    let response = draft_response(draft_id, &flow);
    put_draft(&state, draft_id, flow).await;
    moved?;
    Ok(Json(response))
}

/// `POST /api/registrations/drafts/:id/payment`
///
/// Persists the registration. On failure the draft stays on the payment
/// step so the parent can retry.
pub async fn choose_payment(
    State(state): State<AppState>,
    Path(draft_id): Path<Uuid>,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<Acknowledgement>> {
    let mut flow = take_draft(&state, draft_id).await?;

    let outcome = flow
        .choose_payment(&state.db, &state.config.event, request.method)
        .await
        .cloned();

    match outcome {
        Ok(acknowledgement) => {
            info!("Draft {draft_id} completed");
            Ok(Json(acknowledgement))
        }
        Err(e) => {
            put_draft(&state, draft_id, flow).await;
            Err(e)
        }
    }
}

async fn take_draft(state: &AppState, draft_id: Uuid) -> Result<RegistrationFlow> {
    state
        .drafts
        .write()
        .await
        .remove(&draft_id)
        .filter(|draft| draft.touched_at.elapsed() < DRAFT_TTL)
        .map(|draft| draft.flow)
        .ok_or(Error::DraftNotFound)
}

async fn put_draft(state: &AppState, draft_id: Uuid, flow: RegistrationFlow) {
    let mut drafts = state.drafts.write().await;
    drafts.retain(|_, draft| draft.touched_at.elapsed() < DRAFT_TTL);
    drafts.insert(
        draft_id,
        Draft {
            flow,
            touched_at: Instant::now(),
        },
    );
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        api::test_support::{send, test_state},
        entities::Registration,
        test_utils::*,
    };
    use axum::http::Method;
    use sea_orm::{EntityTrait, PaginatorTrait};
    use serde_json::{Value, json};

    fn form_json(first_name: &str, age: u32) -> Value {
        json!({ "form": test_form(first_name, dob_for_age(age)) })
    }

    #[tokio::test]
    async fn test_draft_to_acknowledgement() -> Result<()> {
        init_test_tracing();
        let db = setup_test_db().await?;
        seed_test_event(&db).await?;
        let (state, _) = test_state(db);

        let (status, draft) = send(
            &state,
            Method::POST,
            "/api/registrations/drafts",
            None,
            Some(form_json("Asha", 5)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(draft["step"], "payment");
        assert_eq!(Registration::find().count(state.db.as_ref()).await?, 0);

        let payment_uri = format!(
            "/api/registrations/drafts/{}/payment",
            draft["draft_id"].as_str().unwrap()
        );
        let (status, ack) = send(
            &state,
            Method::POST,
            &payment_uri,
            None,
            Some(json!({ "method": "cash" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["acknowledgement_id"], "VBS2025-0001");
        assert_eq!(ack["allocation"]["section_name"], "BEGINNERS-A");
        assert_eq!(ack["allocation"]["teacher_name"], "Mary");
        assert_eq!(Registration::find().count(state.db.as_ref()).await?, 1);

        // The draft is gone once the registration is stored
        let (status, _) = send(
            &state,
            Method::POST,
            &payment_uri,
            None,
            Some(json!({ "method": "cash" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_submission_is_conflict() -> Result<()> {
        let db = setup_test_db().await?;
        let dob = dob_for_age(5);
        create_test_registration(&db, "Asha", dob, "VBS2025-0042").await?;
        let (state, _) = test_state(db);

        let (status, body) = send(
            &state,
            Method::POST,
            "/api/registrations/drafts",
            None,
            Some(json!({ "form": test_form("Asha", dob) })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["acknowledgement_id"], "VBS2025-0042");
        assert!(state.drafts.read().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_back_and_resubmit() -> Result<()> {
        let db = setup_test_db().await?;
        let (state, _) = test_state(db);

        let (_, draft) = send(
            &state,
            Method::POST,
            "/api/registrations/drafts",
            None,
            Some(form_json("Asha", 5)),
        )
        .await;
        let draft_id = draft["draft_id"].as_str().unwrap().to_string();

        let (status, back) = send(
            &state,
            Method::POST,
            &format!("/api/registrations/drafts/{draft_id}/back"),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(back["step"], "form");
        assert_eq!(back["pending"]["first_name"], "Asha");

        let mut resubmit = form_json("Asha", 5);
        resubmit["draft_id"] = json!(draft_id);
        resubmit["form"]["parent_name"] = json!("Priya T");
        let (status, again) = send(
            &state,
            Method::POST,
            "/api/registrations/drafts",
            None,
            Some(resubmit),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(again["draft_id"], draft_id.as_str());
        assert_eq!(again["pending"]["parent_name"], "Priya T");
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_phone_is_bad_request() -> Result<()> {
        let (state, _) = test_state(setup_test_db().await?);
        let mut body = form_json("Asha", 5);
        body["form"]["phone_number"] = json!("98765");

        let (status, error) =
            send(&state, Method::POST, "/api/registrations/drafts", None, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"], "Please enter a valid 10-digit mobile number");
        assert_eq!(error["field"], "phone_number");
        Ok(())
    }

    #[tokio::test]
    async fn test_returning_search() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_prior_child(&db, "Ravi", test_date(2018, 6, 1)).await?;
        let (state, _) = test_state(db);

        let (status, found) = send(
            &state,
            Method::POST,
            "/api/registrations/returning/search",
            None,
            Some(json!({ "name": "rav" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["result"]["outcome"], "single");
        assert_eq!(found["form"]["date_of_birth"], "2018-06-01");

        let (_, missing) = send(
            &state,
            Method::POST,
            "/api/registrations/returning/search",
            None,
            Some(json!({ "name": "Zed" })),
        )
        .await;
        assert_eq!(missing["result"]["outcome"], "not_found");
        assert_eq!(missing["message"], crate::core::roster::NOT_FOUND_MESSAGE);
        assert_eq!(missing["form"], Value::Null);

        let (_, wildcard) = send(
            &state,
            Method::POST,
            "/api/registrations/returning/search",
            None,
            Some(json!({ "name": "%" })),
        )
        .await;
        assert_eq!(wildcard["result"]["outcome"], "not_found");
        Ok(())
    }
}
