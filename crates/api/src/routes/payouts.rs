//! Instructor payout routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::{AppState, middleware::AuthUser};
use coursepay_db::entities::payouts;
use coursepay_db::repositories::PayoutError;
use coursepay_db::{PaymentRepository, PayoutRepository};
use coursepay_shared::types::CourseId;

/// Creates the payout routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/courses/{course_id}/payouts", post(create_payout))
        .route("/payouts", get(list_payouts))
}

fn require_instructor(auth: &AuthUser) -> Result<(), Response> {
    if auth.is_instructor() {
        return Ok(());
    }
    Err((
        StatusCode::FORBIDDEN,
        Json(json!({
            "error": "forbidden",
            "message": "Only instructors can access payouts"
        })),
    )
        .into_response())
}

fn payout_json(payout: &payouts::Model) -> serde_json::Value {
    json!({
        "id": payout.id,
        "course_id": payout.course_id,
        "total_amount_minor": payout.total_amount_minor,
        "currency": payout.currency.trim(),
        "payment_count": payout.payment_count,
        "status": payout.status.clone(),
        "transferred": payout.transferred,
        "created_at": payout.created_at.to_rfc3339(),
        "completed_at": payout.completed_at.map(|t| t.to_rfc3339()),
    })
}

fn internal_error(context: &str, err: &dyn std::fmt::Display) -> Response {
    error!(error = %err, "{context}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "internal_error",
            "message": "An error occurred"
        })),
    )
        .into_response()
}

/// POST `/courses/{course_id}/payouts` - Claim the course's captured,
/// unclaimed payments into a new payout.
async fn create_payout(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(course_id): Path<Uuid>,
) -> impl IntoResponse {
    if let Err(response) = require_instructor(&auth) {
        return response;
    }

    let repo = PayoutRepository::new((*state.db).clone());
    match repo
        .create_payout(auth.user_id(), CourseId::from_uuid(course_id))
        .await
    {
        Ok(Some(payout)) => (StatusCode::CREATED, Json(payout_json(&payout))).into_response(),
        Ok(None) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": "nothing_to_claim",
                "message": "No captured payments awaiting payout for this course"
            })),
        )
            .into_response(),
        Err(PayoutError::ClaimRaced) => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "payout_conflict",
                "message": "Another payout request is in progress, try again"
            })),
        )
            .into_response(),
        Err(e) => internal_error("failed to create payout", &e),
    }
}

/// GET `/payouts` - List the caller's payouts with an earnings summary.
async fn list_payouts(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(response) = require_instructor(&auth) {
        return response;
    }

    let payout_repo = PayoutRepository::new((*state.db).clone());
    let payouts = match payout_repo.list_for_instructor(auth.user_id()).await {
        Ok(payouts) => payouts,
        Err(e) => return internal_error("failed to list payouts", &e),
    };

    let payment_repo = PaymentRepository::new((*state.db).clone());
    let earnings = match payment_repo.earnings_summary(auth.user_id()).await {
        Ok(earnings) => earnings,
        Err(e) => return internal_error("failed to summarize earnings", &e),
    };

    let items: Vec<_> = payouts.iter().map(payout_json).collect();
    (
        StatusCode::OK,
        Json(json!({
            "payouts": items,
            "earnings": {
                "total_earned_minor": earnings.total_earned_minor,
                "unclaimed_minor": earnings.unclaimed_minor,
                "captured_count": earnings.captured_count,
            },
        })),
    )
        .into_response()
}
