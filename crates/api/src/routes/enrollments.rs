//! Enrollment routes: free-course enrollment and the caller's enrollments.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::{AppState, middleware::AuthUser};
use coursepay_db::EnrollmentRepository;
use coursepay_shared::types::CourseId;

/// Creates the enrollment routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/courses/{course_id}/enroll", post(enroll_free))
        .route("/enrollments", get(list_enrollments))
}

/// POST `/courses/{course_id}/enroll` - Enroll directly in a free course.
///
/// Paid courses are rejected here and must go through checkout.
async fn enroll_free(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(course_id): Path<Uuid>,
) -> impl IntoResponse {
    let course_id = CourseId::from_uuid(course_id);

    if let Err(e) = state
        .payments
        .check_free_enrollment(auth.user_id(), course_id)
        .await
    {
        return super::payments::error_response(&e);
    }

    let repo = EnrollmentRepository::new((*state.db).clone());
    match repo.create_or_get(auth.user_id(), course_id).await {
        Ok((enrollment, created)) => (
            StatusCode::CREATED,
            Json(json!({
                "enrollment_id": enrollment.id,
                "course_id": enrollment.course_id,
                "created": created,
            })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to create free enrollment");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "internal_error",
                    "message": "An error occurred"
                })),
            )
                .into_response()
        }
    }
}

/// GET `/enrollments` - List the caller's active enrollments.
async fn list_enrollments(
    State(state): State<AppState>,
    auth: AuthUser,
) -> impl IntoResponse {
    let repo = EnrollmentRepository::new((*state.db).clone());

    match repo.list_for_student(auth.user_id()).await {
        Ok(enrollments) => {
            let items: Vec<_> = enrollments
                .into_iter()
                .map(|e| {
                    json!({
                        "id": e.id,
                        "course_id": e.course_id,
                        "payment_id": e.payment_id,
                        "enrolled_at": e.enrolled_at.to_rfc3339(),
                    })
                })
                .collect();

            (StatusCode::OK, Json(json!({ "enrollments": items }))).into_response()
        }
        Err(e) => {
            error!(error = %e, "failed to list enrollments");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "internal_error",
                    "message": "An error occurred"
                })),
            )
                .into_response()
        }
    }
}
