//! Course repository.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use std::str::FromStr;

use coursepay_core::payment::{CourseCatalog, CoursePricing, StoreError};
use coursepay_shared::types::{CourseId, Currency, Money, UserId};

use crate::entities::courses;
use crate::entities::sea_orm_active_enums::CourseStatus;

/// Input for creating a course.
#[derive(Debug, Clone)]
pub struct CreateCourseInput {
    /// Course owner.
    pub instructor_id: UserId,
    /// Display title.
    pub title: String,
    /// Listed price; zero makes the course free.
    pub price: Money,
    /// Platform fee percentage.
    pub platform_fee_percent: Decimal,
    /// Initial publication status.
    pub status: CourseStatus,
}

/// Course repository for CRUD operations and catalog lookups.
#[derive(Debug, Clone)]
pub struct CourseRepository {
    db: DatabaseConnection,
}

impl CourseRepository {
    /// Creates a new course repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a course.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(&self, input: CreateCourseInput) -> Result<courses::Model, DbErr> {
        let now = Utc::now().into();

        courses::ActiveModel {
            id: Set(CourseId::new().into_inner()),
            instructor_id: Set(input.instructor_id.into_inner()),
            title: Set(input.title),
            price_minor: Set(input.price.minor()),
            currency: Set(input.price.currency().to_string()),
            platform_fee_percent: Set(input.platform_fee_percent),
            status: Set(input.status),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
    }

    /// Finds a course by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: CourseId) -> Result<Option<courses::Model>, DbErr> {
        courses::Entity::find_by_id(id.into_inner()).one(&self.db).await
    }

    /// Lists published courses, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_published(&self) -> Result<Vec<courses::Model>, DbErr> {
        courses::Entity::find()
            .filter(courses::Column::Status.eq(CourseStatus::Published))
            .order_by_desc(courses::Column::CreatedAt)
            .all(&self.db)
            .await
    }
}

#[async_trait]
impl CourseCatalog for CourseRepository {
    async fn course_pricing(
        &self,
        course_id: CourseId,
    ) -> Result<Option<CoursePricing>, StoreError> {
        let model = courses::Entity::find_by_id(course_id.into_inner())
            .filter(courses::Column::Status.eq(CourseStatus::Published))
            .one(&self.db)
            .await
            .map_err(|e| StoreError(e.to_string()))?;

        let Some(model) = model else {
            return Ok(None);
        };

        let currency = Currency::from_str(model.currency.trim()).map_err(StoreError)?;

        Ok(Some(CoursePricing {
            course_id,
            instructor_id: UserId::from_uuid(model.instructor_id),
            price: Money::from_minor(model.price_minor, currency),
            platform_fee_percent: model.platform_fee_percent,
        }))
    }
}
