//! Enrollment repository.

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
};

use coursepay_shared::types::{CourseId, EnrollmentId, UserId};

use crate::entities::enrollments;

/// Enrollment repository for direct (free) enrollments and lookups.
///
/// Paid enrollments are created inside the payment capture transaction,
/// not through this repository.
#[derive(Debug, Clone)]
pub struct EnrollmentRepository {
    db: DatabaseConnection,
}

impl EnrollmentRepository {
    /// Creates a new enrollment repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Enrolls a student directly, without a payment. Returns the
    /// enrollment row and whether this call created it; a duplicate
    /// request is absorbed by the unique constraint and returns the
    /// existing row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert or lookup fails.
    pub async fn create_or_get(
        &self,
        student_id: UserId,
        course_id: CourseId,
    ) -> Result<(enrollments::Model, bool), DbErr> {
        let inserted = enrollments::Entity::insert(enrollments::ActiveModel {
            id: Set(EnrollmentId::new().into_inner()),
            student_id: Set(student_id.into_inner()),
            course_id: Set(course_id.into_inner()),
            payment_id: Set(None),
            is_active: Set(true),
            enrolled_at: Set(Utc::now().into()),
        })
        .on_conflict(
            OnConflict::columns([
                enrollments::Column::StudentId,
                enrollments::Column::CourseId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await?;

        let model = enrollments::Entity::find()
            .filter(enrollments::Column::StudentId.eq(student_id.into_inner()))
            .filter(enrollments::Column::CourseId.eq(course_id.into_inner()))
            .one(&self.db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound("enrollment vanished after upsert".into()))?;

        Ok((model, inserted > 0))
    }

    /// Lists a student's active enrollments, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_student(
        &self,
        student_id: UserId,
    ) -> Result<Vec<enrollments::Model>, DbErr> {
        enrollments::Entity::find()
            .filter(enrollments::Column::StudentId.eq(student_id.into_inner()))
            .filter(enrollments::Column::IsActive.eq(true))
            .order_by_desc(enrollments::Column::EnrolledAt)
            .all(&self.db)
            .await
    }
}
