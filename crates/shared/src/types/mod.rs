//! Shared domain types.

pub mod id;
pub mod money;

pub use id::{CourseId, EnrollmentId, PaymentId, PayoutId, UserId};
pub use money::{Currency, Money, MoneyError};
