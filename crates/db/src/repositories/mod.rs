//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod course;
pub mod enrollment;
pub mod payment;
pub mod payout;
pub mod user;

pub use course::{CourseRepository, CreateCourseInput};
pub use enrollment::EnrollmentRepository;
pub use payment::{EarningsSummary, PaymentRepository};
pub use payout::{PayoutError, PayoutRepository};
pub use user::UserRepository;
