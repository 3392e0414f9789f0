//! Payment repository.
//!
//! Implements the core [`PaymentStore`] seam over Postgres. The capture
//! transition runs in a single transaction with a compare-and-set on
//! status, so racing confirmations and webhooks resolve to exactly one
//! capture and one enrollment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use std::str::FromStr;

use coursepay_core::payment::{
    CaptureOutcome, NewPayment, PaymentRecord, PaymentStore, StoreError, WebhookEvent,
    WebhookOutcome,
};
use coursepay_shared::types::{
    CourseId, Currency, EnrollmentId, Money, PaymentId, PayoutId, UserId,
};

use crate::entities::sea_orm_active_enums::PaymentStatus;
use crate::entities::{enrollments, payments};

/// Aggregate view of an instructor's captured earnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EarningsSummary {
    /// Instructor share of every captured payment, in minor units.
    pub total_earned_minor: i64,
    /// Share of captured payments not yet claimed by a payout.
    pub unclaimed_minor: i64,
    /// Number of captured payments.
    pub captured_count: u64,
}

/// Payment repository backed by Postgres.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    db: DatabaseConnection,
}

impl PaymentRepository {
    /// Creates a new payment repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_record(model: payments::Model) -> Result<PaymentRecord, StoreError> {
        let currency = Currency::from_str(model.currency.trim()).map_err(StoreError)?;

        Ok(PaymentRecord {
            id: PaymentId::from_uuid(model.id),
            student_id: UserId::from_uuid(model.student_id),
            instructor_id: UserId::from_uuid(model.instructor_id),
            course_id: CourseId::from_uuid(model.course_id),
            amount: Money::from_minor(model.amount_minor, currency),
            platform_fee: Money::from_minor(model.platform_fee_minor, currency),
            instructor_payout: Money::from_minor(model.instructor_payout_minor, currency),
            status: model.status.into(),
            gateway_order_id: model.gateway_order_id,
            gateway_payment_id: model.gateway_payment_id,
            gateway_signature: model.gateway_signature,
            payout_id: model.payout_id.map(PayoutId::from_uuid),
            created_at: model.created_at.into(),
            completed_at: model.completed_at.map(Into::into),
        })
    }

    async fn find_model<C: ConnectionTrait>(
        conn: &C,
        order_id: &str,
    ) -> Result<Option<payments::Model>, DbErr> {
        payments::Entity::find()
            .filter(payments::Column::GatewayOrderId.eq(order_id))
            .one(conn)
            .await
    }

    /// Sums an instructor's captured earnings, split into total and the
    /// portion no payout has claimed yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a sum overflows.
    pub async fn earnings_summary(
        &self,
        instructor_id: UserId,
    ) -> Result<EarningsSummary, StoreError> {
        let captured = payments::Entity::find()
            .filter(payments::Column::InstructorId.eq(instructor_id.into_inner()))
            .filter(payments::Column::Status.eq(PaymentStatus::Captured))
            .all(&self.db)
            .await
            .map_err(store_err)?;

        let mut summary = EarningsSummary {
            total_earned_minor: 0,
            unclaimed_minor: 0,
            captured_count: 0,
        };
        for payment in &captured {
            summary.total_earned_minor = summary
                .total_earned_minor
                .checked_add(payment.instructor_payout_minor)
                .ok_or_else(|| StoreError("earnings total out of range".into()))?;
            if payment.payout_id.is_none() {
                summary.unclaimed_minor = summary
                    .unclaimed_minor
                    .checked_add(payment.instructor_payout_minor)
                    .ok_or_else(|| StoreError("earnings total out of range".into()))?;
            }
            summary.captured_count += 1;
        }

        Ok(summary)
    }
}

fn store_err(err: DbErr) -> StoreError {
    tracing::error!(error = %err, "payment store operation failed");
    StoreError(err.to_string())
}

#[async_trait]
impl PaymentStore for PaymentRepository {
    async fn insert_created(&self, new: NewPayment) -> Result<PaymentRecord, StoreError> {
        let now = Utc::now();

        let model = payments::ActiveModel {
            id: Set(PaymentId::new().into_inner()),
            student_id: Set(new.student_id.into_inner()),
            instructor_id: Set(new.instructor_id.into_inner()),
            course_id: Set(new.course_id.into_inner()),
            amount_minor: Set(new.amount.minor()),
            platform_fee_minor: Set(new.platform_fee.minor()),
            instructor_payout_minor: Set(new.instructor_payout.minor()),
            currency: Set(new.amount.currency().to_string()),
            status: Set(PaymentStatus::Created),
            gateway_order_id: Set(new.gateway_order_id),
            gateway_payment_id: Set(None),
            gateway_signature: Set(None),
            payout_id: Set(None),
            created_at: Set(now.into()),
            completed_at: Set(None),
        }
        .insert(&self.db)
        .await
        .map_err(store_err)?;

        Self::model_to_record(model)
    }

    async fn find_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Option<PaymentRecord>, StoreError> {
        Self::find_model(&self.db, order_id)
            .await
            .map_err(store_err)?
            .map(Self::model_to_record)
            .transpose()
    }

    async fn capture_and_enroll(
        &self,
        order_id: &str,
        gateway_payment_id: &str,
        gateway_signature: &str,
    ) -> Result<CaptureOutcome, StoreError> {
        let txn = self.db.begin().await.map_err(store_err)?;

        let Some(model) = Self::find_model(&txn, order_id).await.map_err(store_err)? else {
            return Err(StoreError(format!("payment for order {order_id} vanished")));
        };

        match model.status {
            PaymentStatus::Captured => {
                return Ok(CaptureOutcome::AlreadyCaptured {
                    payment: Self::model_to_record(model)?,
                });
            }
            PaymentStatus::Failed | PaymentStatus::Refunded => {
                return Ok(CaptureOutcome::NotCapturable {
                    status: model.status.into(),
                });
            }
            PaymentStatus::Created | PaymentStatus::Authorized => {}
        }

        let now = Utc::now();

        // Compare-and-set: only a created or authorized row may flip to
        // captured. A racing capture makes this a no-op.
        let result = payments::Entity::update_many()
            .col_expr(
                payments::Column::Status,
                Expr::value(PaymentStatus::Captured),
            )
            .col_expr(
                payments::Column::GatewayPaymentId,
                Expr::value(gateway_payment_id),
            )
            .col_expr(
                payments::Column::GatewaySignature,
                Expr::value(gateway_signature),
            )
            .col_expr(payments::Column::CompletedAt, Expr::value(now))
            .filter(payments::Column::Id.eq(model.id))
            .filter(
                payments::Column::Status
                    .is_in([PaymentStatus::Created, PaymentStatus::Authorized]),
            )
            .exec(&txn)
            .await
            .map_err(store_err)?;

        if result.rows_affected == 0 {
            // Lost the race; reclassify from the current row state
            let Some(current) = Self::find_model(&txn, order_id).await.map_err(store_err)?
            else {
                return Err(StoreError(format!("payment for order {order_id} vanished")));
            };
            let outcome = if current.status == PaymentStatus::Captured {
                CaptureOutcome::AlreadyCaptured {
                    payment: Self::model_to_record(current)?,
                }
            } else {
                CaptureOutcome::NotCapturable {
                    status: current.status.into(),
                }
            };
            txn.commit().await.map_err(store_err)?;
            return Ok(outcome);
        }

        let inserted = enrollments::Entity::insert(enrollments::ActiveModel {
            id: Set(EnrollmentId::new().into_inner()),
            student_id: Set(model.student_id),
            course_id: Set(model.course_id),
            payment_id: Set(Some(model.id)),
            is_active: Set(true),
            enrolled_at: Set(now.into()),
        })
        .on_conflict(
            OnConflict::columns([
                enrollments::Column::StudentId,
                enrollments::Column::CourseId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(&txn)
        .await
        .map_err(store_err)?;

        let Some(captured) = Self::find_model(&txn, order_id).await.map_err(store_err)? else {
            return Err(StoreError(format!("payment for order {order_id} vanished")));
        };

        txn.commit().await.map_err(store_err)?;

        Ok(CaptureOutcome::Captured {
            payment: Self::model_to_record(captured)?,
            enrollment_created: inserted > 0,
        })
    }

    async fn apply_webhook(&self, event: &WebhookEvent) -> Result<WebhookOutcome, StoreError> {
        let Some(target) = event.target_status() else {
            return Ok(WebhookOutcome::Ignored);
        };
        let target_db = PaymentStatus::from(target);

        let txn = self.db.begin().await.map_err(store_err)?;

        let model = match event {
            WebhookEvent::PaymentAuthorized { order_id, .. }
            | WebhookEvent::PaymentFailed { order_id } => {
                Self::find_model(&txn, order_id).await.map_err(store_err)?
            }
            WebhookEvent::RefundCreated { payment_id } => payments::Entity::find()
                .filter(payments::Column::GatewayPaymentId.eq(payment_id))
                .one(&txn)
                .await
                .map_err(store_err)?,
            WebhookEvent::Unknown { .. } => None,
        };

        let Some(model) = model else {
            return Ok(WebhookOutcome::NotFound);
        };

        let current: coursepay_core::payment::PaymentStatus = model.status.clone().into();
        if current == target || !current.can_transition_to(target) {
            return Ok(WebhookOutcome::AlreadyApplied);
        }

        // CAS on the observed status; a racing writer makes this a no-op
        let mut update = payments::Entity::update_many()
            .col_expr(payments::Column::Status, Expr::value(target_db))
            .filter(payments::Column::Id.eq(model.id))
            .filter(payments::Column::Status.eq(model.status));

        if let WebhookEvent::PaymentAuthorized { payment_id, .. } = event {
            update = update.col_expr(
                payments::Column::GatewayPaymentId,
                Expr::value(payment_id.as_str()),
            );
        }

        let result = update.exec(&txn).await.map_err(store_err)?;
        txn.commit().await.map_err(store_err)?;

        if result.rows_affected == 0 {
            return Ok(WebhookOutcome::AlreadyApplied);
        }
        Ok(WebhookOutcome::Applied { new_status: target })
    }

    async fn is_actively_enrolled(
        &self,
        student_id: UserId,
        course_id: CourseId,
    ) -> Result<bool, StoreError> {
        let count = enrollments::Entity::find()
            .filter(enrollments::Column::StudentId.eq(student_id.into_inner()))
            .filter(enrollments::Column::CourseId.eq(course_id.into_inner()))
            .filter(enrollments::Column::IsActive.eq(true))
            .count(&self.db)
            .await
            .map_err(store_err)?;

        Ok(count > 0)
    }

    async fn expire_stale_created(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = payments::Entity::update_many()
            .col_expr(payments::Column::Status, Expr::value(PaymentStatus::Failed))
            .filter(payments::Column::Status.eq(PaymentStatus::Created))
            .filter(payments::Column::CreatedAt.lt(cutoff))
            .exec(&self.db)
            .await
            .map_err(store_err)?;

        Ok(result.rows_affected)
    }
}
