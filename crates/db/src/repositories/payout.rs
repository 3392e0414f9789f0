//! Payout repository.
//!
//! A payout claims every captured, unclaimed payment of a course in one
//! transaction and stamps `payout_id` on the claimed rows, so a payment
//! is paid out exactly once even under concurrent requests.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use thiserror::Error;

use coursepay_shared::types::{CourseId, PayoutId, UserId};

use crate::entities::sea_orm_active_enums::{PaymentStatus, PayoutStatus};
use crate::entities::{payments, payouts};

/// Payout creation failures.
#[derive(Debug, Error)]
pub enum PayoutError {
    /// Underlying database failure.
    #[error(transparent)]
    Db(#[from] DbErr),

    /// Claimable payments carry more than one currency; a payout is
    /// single-currency.
    #[error("claimable payments span multiple currencies")]
    MixedCurrency,

    /// The payout sum does not fit in 64-bit minor units.
    #[error("payout amount out of range")]
    Overflow,

    /// A claimed row was modified by a concurrent writer.
    #[error("payout claim raced a concurrent writer")]
    ClaimRaced,
}

/// Payout repository.
#[derive(Debug, Clone)]
pub struct PayoutRepository {
    db: DatabaseConnection,
}

impl PayoutRepository {
    /// Creates a new payout repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a payout for every captured, unclaimed payment of the
    /// instructor's course. Returns None when nothing is claimable,
    /// which includes a course the instructor does not own.
    ///
    /// Claimed rows are locked for the duration of the transaction;
    /// a concurrent payout request for the same course either claims
    /// nothing or waits and then finds nothing left.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails, the claimable payments
    /// mix currencies, or the sum overflows.
    pub async fn create_payout(
        &self,
        instructor_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<payouts::Model>, PayoutError> {
        let txn = self.db.begin().await?;

        let claimable = payments::Entity::find()
            .filter(payments::Column::InstructorId.eq(instructor_id.into_inner()))
            .filter(payments::Column::CourseId.eq(course_id.into_inner()))
            .filter(payments::Column::Status.eq(PaymentStatus::Captured))
            .filter(payments::Column::PayoutId.is_null())
            .lock_exclusive()
            .all(&txn)
            .await?;

        if claimable.is_empty() {
            return Ok(None);
        }

        let currency = claimable[0].currency.clone();
        if claimable.iter().any(|p| p.currency != currency) {
            return Err(PayoutError::MixedCurrency);
        }

        let mut total_amount_minor: i64 = 0;
        for payment in &claimable {
            total_amount_minor = total_amount_minor
                .checked_add(payment.instructor_payout_minor)
                .ok_or(PayoutError::Overflow)?;
        }

        let claimed = u64::try_from(claimable.len()).map_err(|_| PayoutError::Overflow)?;
        let payment_count =
            i32::try_from(claimable.len()).map_err(|_| PayoutError::Overflow)?;
        let payout_id = PayoutId::new().into_inner();

        let payout = payouts::ActiveModel {
            id: Set(payout_id),
            instructor_id: Set(instructor_id.into_inner()),
            course_id: Set(Some(course_id.into_inner())),
            total_amount_minor: Set(total_amount_minor),
            currency: Set(currency),
            payment_count: Set(payment_count),
            status: Set(PayoutStatus::Pending),
            transferred: Set(false),
            created_at: Set(Utc::now().into()),
            completed_at: Set(None),
        }
        .insert(&txn)
        .await?;

        let claimed_ids: Vec<_> = claimable.iter().map(|p| p.id).collect();
        let result = payments::Entity::update_many()
            .col_expr(payments::Column::PayoutId, Expr::value(payout_id))
            .filter(payments::Column::Id.is_in(claimed_ids))
            .filter(payments::Column::PayoutId.is_null())
            .exec(&txn)
            .await?;

        if result.rows_affected != claimed {
            // Rolls back on drop
            return Err(PayoutError::ClaimRaced);
        }

        txn.commit().await?;

        tracing::info!(
            payout_id = %payout.id,
            instructor_id = %instructor_id,
            course_id = %course_id,
            total_amount_minor,
            payment_count,
            "payout created"
        );

        Ok(Some(payout))
    }

    /// Finds a payout by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: PayoutId) -> Result<Option<payouts::Model>, DbErr> {
        payouts::Entity::find_by_id(id.into_inner()).one(&self.db).await
    }

    /// Lists an instructor's payouts, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_instructor(
        &self,
        instructor_id: UserId,
    ) -> Result<Vec<payouts::Model>, DbErr> {
        payouts::Entity::find()
            .filter(payouts::Column::InstructorId.eq(instructor_id.into_inner()))
            .order_by_desc(payouts::Column::CreatedAt)
            .all(&self.db)
            .await
    }

    /// Marks a payout as completed after the transfer settles.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn mark_completed(&self, id: PayoutId) -> Result<bool, DbErr> {
        let result = payouts::Entity::update_many()
            .col_expr(payouts::Column::Status, Expr::value(PayoutStatus::Completed))
            .col_expr(payouts::Column::Transferred, Expr::value(true))
            .col_expr(payouts::Column::CompletedAt, Expr::value(Utc::now()))
            .filter(payouts::Column::Id.eq(id.into_inner()))
            .filter(
                payouts::Column::Status
                    .is_in([PayoutStatus::Pending, PayoutStatus::Processing]),
            )
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }
}
