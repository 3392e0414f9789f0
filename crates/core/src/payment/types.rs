//! Payment domain types and the status state machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use coursepay_shared::types::{CourseId, Money, PaymentId, PayoutId, UserId};

/// Lifecycle states of a payment.
///
/// `Captured`, `Failed`, and `Refunded` are terminal for re-entry: a
/// payment never regresses out of them, though a captured payment may
/// still move to `Refunded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Order exists at the gateway, nothing captured yet.
    Created,
    /// Gateway reported authorization (informational).
    Authorized,
    /// Signature verified, funds secured.
    Captured,
    /// Gateway reported failure or verification was rejected.
    Failed,
    /// Post-capture reversal.
    Refunded,
}

impl PaymentStatus {
    /// Returns true if no further user-driven capture is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Captured | Self::Failed | Self::Refunded)
    }

    /// Returns true if the state machine permits `self -> next`.
    ///
    /// Re-applying the current state is not a transition; callers treat
    /// that case as an idempotent no-op.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Authorized | Self::Captured | Self::Failed)
                | (Self::Authorized, Self::Captured | Self::Failed)
                | (Self::Captured, Self::Refunded)
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Authorized => "authorized",
            Self::Captured => "captured",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        };
        write!(f, "{s}")
    }
}

/// One payment record per checkout attempt.
///
/// Invariant: `platform_fee + instructor_payout == amount` at all times,
/// and `gateway_order_id` is immutable once set. Rows are never deleted;
/// they are the financial record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord {
    /// Payment identifier.
    pub id: PaymentId,
    /// Paying student.
    pub student_id: UserId,
    /// Instructor receiving the payout share.
    pub instructor_id: UserId,
    /// Course being purchased.
    pub course_id: CourseId,
    /// Gross amount charged.
    pub amount: Money,
    /// Platform's share.
    pub platform_fee: Money,
    /// Instructor's share (`amount - platform_fee`).
    pub instructor_payout: Money,
    /// Current lifecycle state.
    pub status: PaymentStatus,
    /// Order identifier assigned by the gateway at initiation.
    pub gateway_order_id: String,
    /// Payment identifier assigned by the gateway at capture.
    pub gateway_payment_id: Option<String>,
    /// Signature presented at capture.
    pub gateway_signature: Option<String>,
    /// Back-reference set once the payout claims this payment.
    pub payout_id: Option<PayoutId>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Capture time.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Read-only pricing view of a course, supplied by the catalog collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoursePricing {
    /// Course identifier.
    pub course_id: CourseId,
    /// Course owner, paid the payout share.
    pub instructor_id: UserId,
    /// Listed price; zero-price courses never reach the orchestrator.
    pub price: Money,
    /// Platform fee percentage (e.g. `10.00`).
    pub platform_fee_percent: Decimal,
}

/// Gateway webhook events, parsed into a closed set with an explicit
/// unknown branch (unknown events are acknowledged and ignored).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Funds authorized for an order.
    PaymentAuthorized {
        /// Gateway order identifier.
        order_id: String,
        /// Gateway payment identifier.
        payment_id: String,
    },
    /// Payment attempt failed at the gateway.
    PaymentFailed {
        /// Gateway order identifier.
        order_id: String,
    },
    /// A refund was created for a captured payment.
    RefundCreated {
        /// Gateway payment identifier.
        payment_id: String,
    },
    /// Event name not recognized; acknowledged without action.
    Unknown {
        /// Raw event name as received.
        event: String,
    },
}

impl WebhookEvent {
    /// Parses a webhook body's event name and payload.
    ///
    /// Missing or malformed identifier fields degrade to `Unknown` so the
    /// endpoint can acknowledge without acting; webhook input is
    /// attacker-adjacent and must never panic.
    #[must_use]
    pub fn parse(event: &str, payload: &serde_json::Value) -> Self {
        let field = |entity: &str, key: &str| -> Option<String> {
            payload
                .get(entity)
                .and_then(|e| e.get(key))
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string)
        };

        match event {
            "payment.authorized" => {
                match (field("payment", "order_id"), field("payment", "id")) {
                    (Some(order_id), Some(payment_id)) => Self::PaymentAuthorized {
                        order_id,
                        payment_id,
                    },
                    _ => Self::Unknown {
                        event: event.to_string(),
                    },
                }
            }
            "payment.failed" => match field("payment", "order_id") {
                Some(order_id) => Self::PaymentFailed { order_id },
                None => Self::Unknown {
                    event: event.to_string(),
                },
            },
            "refund.created" => match field("refund", "payment_id") {
                Some(payment_id) => Self::RefundCreated { payment_id },
                None => Self::Unknown {
                    event: event.to_string(),
                },
            },
            other => Self::Unknown {
                event: other.to_string(),
            },
        }
    }

    /// The payment status this event drives toward, if any.
    #[must_use]
    pub const fn target_status(&self) -> Option<PaymentStatus> {
        match self {
            Self::PaymentAuthorized { .. } => Some(PaymentStatus::Authorized),
            Self::PaymentFailed { .. } => Some(PaymentStatus::Failed),
            Self::RefundCreated { .. } => Some(PaymentStatus::Refunded),
            Self::Unknown { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_terminal_statuses() {
        assert!(!PaymentStatus::Created.is_terminal());
        assert!(!PaymentStatus::Authorized.is_terminal());
        assert!(PaymentStatus::Captured.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(PaymentStatus::Refunded.is_terminal());
    }

    #[test]
    fn test_no_regression_from_terminal() {
        for terminal in [
            PaymentStatus::Captured,
            PaymentStatus::Failed,
            PaymentStatus::Refunded,
        ] {
            assert!(!terminal.can_transition_to(PaymentStatus::Created));
            assert!(!terminal.can_transition_to(PaymentStatus::Authorized));
        }
        // The one permitted exit from a terminal state
        assert!(PaymentStatus::Captured.can_transition_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Failed.can_transition_to(PaymentStatus::Refunded));
    }

    #[test]
    fn test_self_transition_is_not_a_transition() {
        for status in [
            PaymentStatus::Created,
            PaymentStatus::Authorized,
            PaymentStatus::Captured,
            PaymentStatus::Failed,
            PaymentStatus::Refunded,
        ] {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn test_capture_paths() {
        assert!(PaymentStatus::Created.can_transition_to(PaymentStatus::Captured));
        assert!(PaymentStatus::Authorized.can_transition_to(PaymentStatus::Captured));
        assert!(!PaymentStatus::Refunded.can_transition_to(PaymentStatus::Captured));
    }

    #[test]
    fn test_parse_payment_authorized() {
        let payload = json!({
            "payment": { "id": "pay_123", "order_id": "order_456" }
        });
        let event = WebhookEvent::parse("payment.authorized", &payload);
        assert_eq!(
            event,
            WebhookEvent::PaymentAuthorized {
                order_id: "order_456".into(),
                payment_id: "pay_123".into(),
            }
        );
        assert_eq!(event.target_status(), Some(PaymentStatus::Authorized));
    }

    #[test]
    fn test_parse_payment_failed() {
        let payload = json!({ "payment": { "order_id": "order_456" } });
        let event = WebhookEvent::parse("payment.failed", &payload);
        assert_eq!(
            event,
            WebhookEvent::PaymentFailed {
                order_id: "order_456".into()
            }
        );
    }

    #[test]
    fn test_parse_refund_created() {
        let payload = json!({ "refund": { "payment_id": "pay_123" } });
        let event = WebhookEvent::parse("refund.created", &payload);
        assert_eq!(
            event,
            WebhookEvent::RefundCreated {
                payment_id: "pay_123".into()
            }
        );
    }

    #[test]
    fn test_parse_unknown_event_name() {
        let event = WebhookEvent::parse("subscription.charged", &json!({}));
        assert!(matches!(event, WebhookEvent::Unknown { .. }));
        assert_eq!(event.target_status(), None);
    }

    #[test]
    fn test_parse_missing_fields_degrades_to_unknown() {
        let event = WebhookEvent::parse("payment.authorized", &json!({ "payment": {} }));
        assert!(matches!(event, WebhookEvent::Unknown { .. }));

        let event = WebhookEvent::parse("refund.created", &json!({ "refund": { "payment_id": 7 } }));
        assert!(matches!(event, WebhookEvent::Unknown { .. }));
    }
}
