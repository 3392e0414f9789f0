//! Shared types, errors, and configuration for Coursepay.
//!
//! This crate provides common types used across all other crates:
//! - Money as integer minor units with decimal boundaries
//! - Typed IDs for type-safe entity references
//! - JWT claims and token service
//! - Configuration management

pub mod auth;
pub mod config;
pub mod jwt;
pub mod types;

pub use auth::Claims;
pub use config::AppConfig;
pub use jwt::{JwtConfig, JwtError, JwtService};
