//! `SeaORM` Entity for payments table.
//!
//! Rows are append-only apart from status transitions; they are the
//! financial record and are never deleted.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::PaymentStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub student_id: Uuid,
    pub instructor_id: Uuid,
    pub course_id: Uuid,
    /// Gross amount in minor units.
    pub amount_minor: i64,
    /// Platform's share in minor units.
    pub platform_fee_minor: i64,
    /// Instructor's share; `amount_minor - platform_fee_minor` always.
    pub instructor_payout_minor: i64,
    pub currency: String,
    pub status: PaymentStatus,
    #[sea_orm(unique)]
    pub gateway_order_id: String,
    #[sea_orm(unique)]
    pub gateway_payment_id: Option<String>,
    pub gateway_signature: Option<String>,
    /// Set once a payout claims this payment; enforces exactly-once payout.
    pub payout_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub completed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::StudentId",
        to = "super::users::Column::Id"
    )]
    Users,
    #[sea_orm(
        belongs_to = "super::courses::Entity",
        from = "Column::CourseId",
        to = "super::courses::Column::Id"
    )]
    Courses,
    #[sea_orm(
        belongs_to = "super::payouts::Entity",
        from = "Column::PayoutId",
        to = "super::payouts::Column::Id"
    )]
    Payouts,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::courses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Courses.def()
    }
}

impl Related<super::payouts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payouts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
