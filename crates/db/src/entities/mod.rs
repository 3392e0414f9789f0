//! `SeaORM` entity definitions.

pub mod courses;
pub mod enrollments;
pub mod payments;
pub mod payouts;
pub mod sea_orm_active_enums;
pub mod users;
