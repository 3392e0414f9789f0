//! Persistence seams for the payment orchestrator.
//!
//! The store must provide atomic read-modify-write for the capture
//! transition: two concurrent confirmations (or a confirmation racing a
//! webhook) for the same order must resolve to exactly one capture and
//! exactly one enrollment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::types::{CoursePricing, PaymentRecord, PaymentStatus, WebhookEvent};
use coursepay_shared::types::{CourseId, Money, UserId};

/// Storage failure. Details are logged by the store implementation; the
/// orchestrator only needs to know the whole transaction rolled back.
#[derive(Debug, Error)]
#[error("storage error: {0}")]
pub struct StoreError(pub String);

/// Input for persisting a freshly initiated payment.
#[derive(Debug, Clone)]
pub struct NewPayment {
    /// Paying student.
    pub student_id: UserId,
    /// Instructor receiving the payout share.
    pub instructor_id: UserId,
    /// Course being purchased.
    pub course_id: CourseId,
    /// Gross amount.
    pub amount: Money,
    /// Platform's share.
    pub platform_fee: Money,
    /// Instructor's share.
    pub instructor_payout: Money,
    /// Order identifier returned by the gateway.
    pub gateway_order_id: String,
}

/// Result of an atomic capture attempt.
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    /// This call performed the capture and the enrollment upsert.
    Captured {
        /// The payment after the transition.
        payment: PaymentRecord,
        /// False when the enrollment already existed (e.g. free-enroll race).
        enrollment_created: bool,
    },
    /// The payment was already captured; nothing was written.
    AlreadyCaptured {
        /// The previously captured payment.
        payment: PaymentRecord,
    },
    /// The payment sits in a state that cannot be captured (failed,
    /// refunded); nothing was written.
    NotCapturable {
        /// The state that blocked the capture.
        status: PaymentStatus,
    },
}

/// Result of applying a webhook transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The transition was applied.
    Applied {
        /// The status written.
        new_status: PaymentStatus,
    },
    /// The payment already held the target state, or sits in a terminal
    /// state the event may not displace; no write happened.
    AlreadyApplied,
    /// No payment matches the event's identifiers.
    NotFound,
    /// The event carries no transition (unknown event kind).
    Ignored,
}

/// Durable payment/enrollment store.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persists a new payment in `created` status.
    async fn insert_created(&self, payment: NewPayment) -> Result<PaymentRecord, StoreError>;

    /// Looks up a payment by its gateway order identifier.
    async fn find_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Option<PaymentRecord>, StoreError>;

    /// Atomically captures the payment and upserts the enrollment in one
    /// transaction, guarded by a compare-and-set on status.
    ///
    /// A payment is never left captured without its enrollment, and a
    /// storage failure rolls back both writes.
    async fn capture_and_enroll(
        &self,
        order_id: &str,
        gateway_payment_id: &str,
        gateway_signature: &str,
    ) -> Result<CaptureOutcome, StoreError>;

    /// Applies a webhook-driven transition idempotently. A capture is
    /// never demoted; re-applying a held state is a no-op.
    async fn apply_webhook(&self, event: &WebhookEvent) -> Result<WebhookOutcome, StoreError>;

    /// Returns true if the student holds an active enrollment.
    async fn is_actively_enrolled(
        &self,
        student_id: UserId,
        course_id: CourseId,
    ) -> Result<bool, StoreError>;

    /// Marks `created` payments older than the cutoff as failed, returning
    /// how many rows were swept. Abandoned checkouts are expected and this
    /// is the explicit expiry for them.
    async fn expire_stale_created(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Read-only course pricing collaborator.
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    /// Returns pricing for a course, or None if the course does not exist.
    async fn course_pricing(
        &self,
        course_id: CourseId,
    ) -> Result<Option<CoursePricing>, StoreError>;
}
