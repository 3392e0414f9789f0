//! Payment error taxonomy.

use thiserror::Error;

use super::fees::FeeError;
use super::store::StoreError;
use super::types::PaymentStatus;
use crate::gateway::GatewayError;
use coursepay_shared::types::{CourseId, Money, UserId};

/// Failures of the payment orchestrator.
///
/// A duplicate confirmation is not represented here: it is an idempotent
/// success, reported through [`super::service::ConfirmOutcome`].
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The course does not exist.
    #[error("course {0} not found")]
    CourseNotFound(CourseId),

    /// Zero-price courses enroll directly and never reach checkout.
    #[error("course {0} is free; use direct enrollment")]
    FreeCourse(CourseId),

    /// Direct enrollment was requested for a priced course.
    #[error("course {course_id} costs {price}; checkout required")]
    NotFree {
        /// The course in question.
        course_id: CourseId,
        /// Its listed price.
        price: Money,
    },

    /// The student already holds an active enrollment.
    #[error("student {student_id} already enrolled in course {course_id}")]
    AlreadyEnrolled {
        /// The enrolled student.
        student_id: UserId,
        /// The course in question.
        course_id: CourseId,
    },

    /// Confirmation referenced an unknown order.
    #[error("no payment for order {0}")]
    PaymentNotFound(String),

    /// The presented signature did not verify. Possible tampering or a
    /// client bug; never treated as success, and the stored payment is
    /// left untouched so a corrected retry remains possible.
    #[error("payment signature invalid")]
    SignatureInvalid,

    /// The payment sits in a state that cannot be captured.
    #[error("payment in state {0} cannot be captured")]
    NotCapturable(PaymentStatus),

    /// Gateway failure (unavailable or rejected), propagated as typed
    /// failures rather than raw transport errors.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Fee computation failed.
    #[error(transparent)]
    Fees(#[from] FeeError),

    /// Storage failure; the surrounding transaction rolled back.
    #[error(transparent)]
    Storage(#[from] StoreError),
}
