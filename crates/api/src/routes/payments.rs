//! Payment routes: checkout, confirmation, and the gateway webhook.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

use crate::{AppState, middleware::AuthUser};
use coursepay_core::payment::{PaymentError, PaymentRecord, WebhookEvent, signature};
use coursepay_shared::types::CourseId;

/// Creates the authenticated payment routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/courses/{course_id}/checkout", post(checkout))
        .route("/payments/confirm", post(confirm))
        .route("/payments/{order_id}", get(get_payment))
}

/// Creates the webhook route. Authenticated by body signature, so it is
/// mounted outside the bearer-token middleware.
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/payments/webhook", post(webhook))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for confirming a payment.
#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    /// Gateway order identifier from checkout.
    pub order_id: String,
    /// Gateway payment identifier from the checkout widget.
    pub payment_id: String,
    /// Hex HMAC signature over `"order_id|payment_id"`.
    pub signature: String,
    /// Course the client believes it is paying for; informational, the
    /// payment row is the source of truth.
    #[serde(default)]
    pub course_id: Option<Uuid>,
}

/// Webhook envelope: event name plus event-specific payload.
#[derive(Debug, Deserialize)]
struct WebhookBody {
    event: String,
    #[serde(default)]
    payload: serde_json::Value,
}

fn payment_json(payment: &PaymentRecord) -> serde_json::Value {
    json!({
        "payment_id": payment.id,
        "course_id": payment.course_id,
        "status": payment.status.to_string(),
        "amount_minor": payment.amount.minor(),
        "platform_fee_minor": payment.platform_fee.minor(),
        "instructor_payout_minor": payment.instructor_payout.minor(),
        "currency": payment.amount.currency().to_string(),
        "gateway_order_id": payment.gateway_order_id,
        "created_at": payment.created_at.to_rfc3339(),
        "completed_at": payment.completed_at.map(|t| t.to_rfc3339()),
    })
}

/// Maps orchestrator errors onto HTTP responses.
pub(crate) fn error_response(err: &PaymentError) -> Response {
    let (status, error, message) = match err {
        PaymentError::CourseNotFound(_) => (
            StatusCode::NOT_FOUND,
            "course_not_found",
            "Course not found",
        ),
        PaymentError::FreeCourse(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "free_course",
            "Free courses enroll directly; checkout is for paid courses",
        ),
        PaymentError::NotFree { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "checkout_required",
            "Paid courses must go through checkout",
        ),
        PaymentError::AlreadyEnrolled { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "already_enrolled",
            "Student is already enrolled in this course",
        ),
        PaymentError::PaymentNotFound(_) => (
            StatusCode::NOT_FOUND,
            "payment_not_found",
            "Payment not found",
        ),
        PaymentError::SignatureInvalid => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "status": "failed",
                    "error": "signature_invalid",
                    "message": "Payment signature verification failed"
                })),
            )
                .into_response();
        }
        PaymentError::NotCapturable(_) => (
            StatusCode::CONFLICT,
            "not_capturable",
            "Payment is not in a capturable state",
        ),
        PaymentError::Gateway(coursepay_core::gateway::GatewayError::Unavailable(_)) => (
            StatusCode::BAD_GATEWAY,
            "gateway_unavailable",
            "Payment gateway is unavailable, try again shortly",
        ),
        PaymentError::Gateway(coursepay_core::gateway::GatewayError::Rejected(_)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "gateway_rejected",
            "Payment gateway rejected the order",
        ),
        PaymentError::Fees(_) | PaymentError::Storage(_) => {
            error!(error = %err, "payment operation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An error occurred",
            )
        }
    };

    (status, Json(json!({ "error": error, "message": message }))).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST `/courses/{course_id}/checkout` - Open a checkout for a paid course.
async fn checkout(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(course_id): Path<Uuid>,
) -> impl IntoResponse {
    match state
        .payments
        .initiate(auth.user_id(), CourseId::from_uuid(course_id))
        .await
    {
        Ok(initiated) => (
            StatusCode::CREATED,
            Json(json!({
                "payment_id": initiated.payment.id,
                "gateway_order_id": initiated.order.order_id,
                "amount_minor": initiated.order.amount_minor,
                "currency": initiated.payment.amount.currency().to_string(),
                "key_id": state.gateway.key_id,
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// POST `/payments/confirm` - Verify the gateway signature and capture.
async fn confirm(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> impl IntoResponse {
    match state
        .payments
        .confirm(
            auth.user_id(),
            &payload.order_id,
            &payload.payment_id,
            &payload.signature,
        )
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "payment_id": outcome.payment.id,
                "course_id": outcome.payment.course_id,
                "enrollment_created": outcome.enrollment_created,
                "duplicate": outcome.duplicate,
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET `/payments/{order_id}` - Fetch one of the caller's payments.
async fn get_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(order_id): Path<String>,
) -> impl IntoResponse {
    match state.payments.find_for_student(auth.user_id(), &order_id).await {
        Ok(payment) => (StatusCode::OK, Json(payment_json(&payment))).into_response(),
        Err(e) => error_response(&e),
    }
}

/// POST `/payments/webhook` - Gateway event sink.
///
/// The body is verified against the webhook secret before parsing.
/// Recognized events with valid signatures are always acknowledged with
/// 200, whatever their effect, so the gateway stops retrying; only a
/// storage failure returns 500 to trigger a retry.
async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let provided = headers
        .get("X-Gateway-Signature")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    if !signature::verify_body(&body, provided, &state.gateway.webhook_secret) {
        warn!("webhook rejected: bad signature");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_signature",
                "message": "Webhook signature verification failed"
            })),
        )
            .into_response();
    }

    let Ok(parsed) = serde_json::from_slice::<WebhookBody>(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_payload",
                "message": "Webhook body is not valid JSON"
            })),
        )
            .into_response();
    };

    let event = WebhookEvent::parse(&parsed.event, &parsed.payload);
    match state.payments.handle_webhook(&event).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(e) => {
            error!(error = %e, event = %parsed.event, "webhook processing failed");
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

#[cfg(test)]
mod tests {
    use super::*;
    use coursepay_core::gateway::GatewayError;
    use coursepay_core::payment::{PaymentStatus, StoreError};
    use coursepay_shared::types::UserId;

    #[rstest::rstest]
    #[case(PaymentError::CourseNotFound(CourseId::new()), StatusCode::NOT_FOUND)]
    #[case(PaymentError::FreeCourse(CourseId::new()), StatusCode::UNPROCESSABLE_ENTITY)]
    #[case(
        PaymentError::AlreadyEnrolled {
            student_id: UserId::new(),
            course_id: CourseId::new(),
        },
        StatusCode::UNPROCESSABLE_ENTITY
    )]
    #[case(PaymentError::PaymentNotFound("order_x".into()), StatusCode::NOT_FOUND)]
    #[case(PaymentError::SignatureInvalid, StatusCode::BAD_REQUEST)]
    #[case(
        PaymentError::NotCapturable(PaymentStatus::Failed),
        StatusCode::CONFLICT
    )]
    #[case(
        PaymentError::Gateway(GatewayError::Unavailable("down".into())),
        StatusCode::BAD_GATEWAY
    )]
    #[case(
        PaymentError::Gateway(GatewayError::Rejected("bad order".into())),
        StatusCode::UNPROCESSABLE_ENTITY
    )]
    #[case(
        PaymentError::Storage(StoreError("boom".into())),
        StatusCode::INTERNAL_SERVER_ERROR
    )]
    fn test_error_status_mapping(#[case] err: PaymentError, #[case] expected: StatusCode) {
        assert_eq!(error_response(&err).status(), expected, "{err}");
    }
}
