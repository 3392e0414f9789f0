//! Authentication types for JWT access tokens.
//!
//! Account management (registration, OTP, password reset) lives in a
//! separate service; this crate only needs to identify callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Platform roles carried in access tokens.
pub mod roles {
    /// Student role.
    pub const STUDENT: &str = "student";
    /// Instructor role.
    pub const INSTRUCTOR: &str = "instructor";
    /// Admin role.
    pub const ADMIN: &str = "admin";
}

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: Uuid,
    /// User's platform role (student, instructor, admin).
    pub role: String,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
}

impl Claims {
    /// Creates new claims for a user.
    #[must_use]
    pub fn new(user_id: Uuid, role: &str, expires_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            role: role.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    /// Returns the user ID from claims.
    #[must_use]
    pub const fn user_id(&self) -> Uuid {
        self.sub
    }

    /// Returns true if the caller is an instructor.
    #[must_use]
    pub fn is_instructor(&self) -> bool {
        self.role == roles::INSTRUCTOR
    }

    /// Returns true if the caller is an admin.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == roles::ADMIN
    }
}
