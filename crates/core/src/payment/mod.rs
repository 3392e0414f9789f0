//! Payment confirmation and reconciliation logic.
//!
//! The flow is: `initiate` creates a gateway order plus a `created`
//! payment row; `confirm` verifies the gateway signature and atomically
//! captures the payment and enrolls the student; `handle_webhook` applies
//! asynchronous gateway transitions idempotently.

pub mod error;
pub mod fees;
pub mod service;
pub mod signature;
pub mod store;
pub mod types;

pub use error::PaymentError;
pub use fees::{FeeBreakdown, FeeError, split_fee};
pub use service::{ConfirmOutcome, InitiatedPayment, PaymentService};
pub use store::{
    CaptureOutcome, CourseCatalog, NewPayment, PaymentStore, StoreError, WebhookOutcome,
};
pub use types::{CoursePricing, PaymentRecord, PaymentStatus, WebhookEvent};
