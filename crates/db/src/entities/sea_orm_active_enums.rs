//! Postgres enum mappings.

use coursepay_core::payment::PaymentStatus as CorePaymentStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Platform user roles.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "user_role")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Enrolls in courses and pays for them.
    #[sea_orm(string_value = "student")]
    Student,
    /// Publishes courses and receives payouts.
    #[sea_orm(string_value = "instructor")]
    Instructor,
    /// Platform operator.
    #[sea_orm(string_value = "admin")]
    Admin,
}

/// Course publication states.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "course_status")]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    /// Not yet visible to students.
    #[sea_orm(string_value = "draft")]
    Draft,
    /// Purchasable.
    #[sea_orm(string_value = "published")]
    Published,
    /// Withdrawn from the catalog.
    #[sea_orm(string_value = "archived")]
    Archived,
}

/// Payment lifecycle states, mirrored from the domain state machine.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "payment_status")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Order exists at the gateway.
    #[sea_orm(string_value = "created")]
    Created,
    /// Gateway reported authorization.
    #[sea_orm(string_value = "authorized")]
    Authorized,
    /// Signature verified, funds secured.
    #[sea_orm(string_value = "captured")]
    Captured,
    /// Failed at the gateway or expired.
    #[sea_orm(string_value = "failed")]
    Failed,
    /// Reversed after capture.
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

impl From<CorePaymentStatus> for PaymentStatus {
    fn from(status: CorePaymentStatus) -> Self {
        match status {
            CorePaymentStatus::Created => Self::Created,
            CorePaymentStatus::Authorized => Self::Authorized,
            CorePaymentStatus::Captured => Self::Captured,
            CorePaymentStatus::Failed => Self::Failed,
            CorePaymentStatus::Refunded => Self::Refunded,
        }
    }
}

impl From<PaymentStatus> for CorePaymentStatus {
    fn from(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Created => Self::Created,
            PaymentStatus::Authorized => Self::Authorized,
            PaymentStatus::Captured => Self::Captured,
            PaymentStatus::Failed => Self::Failed,
            PaymentStatus::Refunded => Self::Refunded,
        }
    }
}

/// Payout lifecycle states.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "payout_status")]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    /// Recorded, awaiting transfer.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Transfer in flight.
    #[sea_orm(string_value = "processing")]
    Processing,
    /// Transferred to the instructor.
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Transfer failed; the payout keeps its claimed payments.
    #[sea_orm(string_value = "failed")]
    Failed,
}
