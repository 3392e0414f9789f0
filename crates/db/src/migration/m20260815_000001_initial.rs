//! Initial database migration.
//!
//! Creates enums, core tables, and indexes for the payment and
//! enrollment subsystem.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: CORE TABLES
        // ============================================================
        db.execute_unprepared(USERS_SQL).await?;
        db.execute_unprepared(COURSES_SQL).await?;
        db.execute_unprepared(PAYOUTS_SQL).await?;
        db.execute_unprepared(PAYMENTS_SQL).await?;
        db.execute_unprepared(ENROLLMENTS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
-- User roles
CREATE TYPE user_role AS ENUM (
    'student',
    'instructor',
    'admin'
);

-- Course publication status
CREATE TYPE course_status AS ENUM (
    'draft',
    'published',
    'archived'
);

-- Payment lifecycle
CREATE TYPE payment_status AS ENUM (
    'created',
    'authorized',
    'captured',
    'failed',
    'refunded'
);

-- Payout lifecycle
CREATE TYPE payout_status AS ENUM (
    'pending',
    'processing',
    'completed',
    'failed'
);
";

const USERS_SQL: &str = r"
CREATE TABLE users (
    id UUID PRIMARY KEY,
    full_name VARCHAR(255) NOT NULL,
    email VARCHAR(255) NOT NULL UNIQUE,
    role user_role NOT NULL DEFAULT 'student',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
";

const COURSES_SQL: &str = r"
CREATE TABLE courses (
    id UUID PRIMARY KEY,
    instructor_id UUID NOT NULL REFERENCES users(id),
    title VARCHAR(255) NOT NULL,
    price_minor BIGINT NOT NULL DEFAULT 0 CHECK (price_minor >= 0),
    currency CHAR(3) NOT NULL DEFAULT 'INR',
    platform_fee_percent NUMERIC(5, 2) NOT NULL DEFAULT 10.00
        CHECK (platform_fee_percent >= 0 AND platform_fee_percent <= 100),
    status course_status NOT NULL DEFAULT 'draft',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX idx_courses_instructor ON courses(instructor_id);
CREATE INDEX idx_courses_status ON courses(status);
";

const PAYOUTS_SQL: &str = r"
CREATE TABLE payouts (
    id UUID PRIMARY KEY,
    instructor_id UUID NOT NULL REFERENCES users(id),
    course_id UUID REFERENCES courses(id),
    total_amount_minor BIGINT NOT NULL CHECK (total_amount_minor > 0),
    currency CHAR(3) NOT NULL DEFAULT 'INR',
    payment_count INTEGER NOT NULL CHECK (payment_count > 0),
    status payout_status NOT NULL DEFAULT 'pending',
    transferred BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    completed_at TIMESTAMPTZ
);

CREATE INDEX idx_payouts_instructor ON payouts(instructor_id);
";

const PAYMENTS_SQL: &str = r"
CREATE TABLE payments (
    id UUID PRIMARY KEY,
    student_id UUID NOT NULL REFERENCES users(id),
    instructor_id UUID NOT NULL REFERENCES users(id),
    course_id UUID NOT NULL REFERENCES courses(id),
    amount_minor BIGINT NOT NULL CHECK (amount_minor > 0),
    platform_fee_minor BIGINT NOT NULL CHECK (platform_fee_minor >= 0),
    instructor_payout_minor BIGINT NOT NULL CHECK (instructor_payout_minor >= 0),
    currency CHAR(3) NOT NULL DEFAULT 'INR',
    status payment_status NOT NULL DEFAULT 'created',
    gateway_order_id VARCHAR(255) NOT NULL UNIQUE,
    gateway_payment_id VARCHAR(255) UNIQUE,
    gateway_signature VARCHAR(255),
    payout_id UUID REFERENCES payouts(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    completed_at TIMESTAMPTZ,

    -- The fee split must always reconcile
    CONSTRAINT chk_fee_split CHECK (
        platform_fee_minor + instructor_payout_minor = amount_minor
    )
);

CREATE INDEX idx_payments_student ON payments(student_id);
CREATE INDEX idx_payments_course ON payments(course_id);
CREATE INDEX idx_payments_status ON payments(status);

-- Unclaimed captured payments, scanned at payout time
CREATE INDEX idx_payments_unclaimed ON payments(instructor_id)
    WHERE status = 'captured' AND payout_id IS NULL;
";

const ENROLLMENTS_SQL: &str = r"
CREATE TABLE enrollments (
    id UUID PRIMARY KEY,
    student_id UUID NOT NULL REFERENCES users(id),
    course_id UUID NOT NULL REFERENCES courses(id),
    payment_id UUID REFERENCES payments(id),
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    enrolled_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    -- A student enrolls in a course at most once
    CONSTRAINT uq_enrollment UNIQUE (student_id, course_id)
);

CREATE INDEX idx_enrollments_student ON enrollments(student_id);
CREATE INDEX idx_enrollments_course ON enrollments(course_id);
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS enrollments CASCADE;
DROP TABLE IF EXISTS payments CASCADE;
DROP TABLE IF EXISTS payouts CASCADE;
DROP TABLE IF EXISTS courses CASCADE;
DROP TABLE IF EXISTS users CASCADE;

DROP TYPE IF EXISTS payout_status;
DROP TYPE IF EXISTS payment_status;
DROP TYPE IF EXISTS course_status;
DROP TYPE IF EXISTS user_role;
";
