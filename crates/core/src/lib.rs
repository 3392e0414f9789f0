//! Core business logic for Coursepay.
//!
//! This crate contains the payment confirmation and reconciliation logic
//! with no web-server or database dependencies. Persistence and course
//! pricing are reached through traits so the orchestrator can be driven
//! by test doubles.
//!
//! # Modules
//!
//! - `payment` - fee split, signature verification, state machine, orchestrator
//! - `gateway` - outbound payment gateway client (order creation)

pub mod gateway;
pub mod payment;
