//! Payment orchestrator.
//!
//! Generic over its gateway, store, and catalog collaborators so the
//! state machine can be exercised against in-memory doubles without a
//! database or network.

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::{info, warn};

use super::error::PaymentError;
use super::fees::split_fee;
use super::signature;
use super::store::{CaptureOutcome, CourseCatalog, NewPayment, PaymentStore, WebhookOutcome};
use super::types::{CoursePricing, PaymentRecord, WebhookEvent};
use crate::gateway::{GatewayClient, GatewayOrder, OrderRequest};
use coursepay_shared::types::{CourseId, UserId};

/// A checkout that has been opened at the gateway and recorded locally.
#[derive(Debug, Clone)]
pub struct InitiatedPayment {
    /// The persisted `created` payment row.
    pub payment: PaymentRecord,
    /// The remote order, echoed for the client-side checkout widget.
    pub order: GatewayOrder,
}

/// Result of a successful confirmation.
#[derive(Debug, Clone)]
pub struct ConfirmOutcome {
    /// The captured payment.
    pub payment: PaymentRecord,
    /// True if this confirmation created the enrollment.
    pub enrollment_created: bool,
    /// True if the payment was already captured and this call wrote
    /// nothing. Re-confirming an already captured payment is a success.
    pub duplicate: bool,
}

/// Orchestrates checkout initiation, confirmation, and webhook-driven
/// reconciliation over injected collaborators.
pub struct PaymentService<G, S, C> {
    gateway: G,
    store: S,
    catalog: C,
    key_secret: String,
}

impl<G, S, C> PaymentService<G, S, C>
where
    G: GatewayClient,
    S: PaymentStore,
    C: CourseCatalog,
{
    /// Builds the orchestrator. `key_secret` signs confirmation payloads
    /// at the gateway and is what signatures are verified against.
    pub fn new(gateway: G, store: S, catalog: C, key_secret: String) -> Self {
        Self {
            gateway,
            store,
            catalog,
            key_secret,
        }
    }

    /// Opens a checkout: computes the fee split, creates the gateway
    /// order, and persists a `created` payment row.
    ///
    /// A gateway failure here leaves no local record; the student simply
    /// retries checkout.
    pub async fn initiate(
        &self,
        student_id: UserId,
        course_id: CourseId,
    ) -> Result<InitiatedPayment, PaymentError> {
        let pricing = self
            .catalog
            .course_pricing(course_id)
            .await?
            .ok_or(PaymentError::CourseNotFound(course_id))?;

        if pricing.price.is_zero() {
            return Err(PaymentError::FreeCourse(course_id));
        }
        if self.store.is_actively_enrolled(student_id, course_id).await? {
            return Err(PaymentError::AlreadyEnrolled {
                student_id,
                course_id,
            });
        }

        let split = split_fee(pricing.price, pricing.platform_fee_percent)?;

        let order = self
            .gateway
            .create_order(&OrderRequest {
                amount_minor: split.amount.minor(),
                currency: split.amount.currency(),
                receipt: format!("course_{course_id}_student_{student_id}"),
                notes: json!({
                    "course_id": course_id.to_string(),
                    "student_id": student_id.to_string(),
                }),
            })
            .await?;

        let payment = self
            .store
            .insert_created(NewPayment {
                student_id,
                instructor_id: pricing.instructor_id,
                course_id,
                amount: split.amount,
                platform_fee: split.platform_fee,
                instructor_payout: split.instructor_payout,
                gateway_order_id: order.order_id.clone(),
            })
            .await?;

        info!(
            payment_id = %payment.id,
            order_id = %order.order_id,
            amount_minor = split.amount.minor(),
            "checkout initiated"
        );

        Ok(InitiatedPayment { payment, order })
    }

    /// Confirms a checkout: verifies the gateway signature, then
    /// atomically captures the payment and enrolls the student.
    ///
    /// A failed verification leaves the payment untouched so a corrected
    /// retry remains possible. Payments belonging to a different student
    /// are reported as not found.
    pub async fn confirm(
        &self,
        student_id: UserId,
        order_id: &str,
        gateway_payment_id: &str,
        provided_signature: &str,
    ) -> Result<ConfirmOutcome, PaymentError> {
        let payment = self
            .store
            .find_by_order_id(order_id)
            .await?
            .ok_or_else(|| PaymentError::PaymentNotFound(order_id.to_string()))?;

        if payment.student_id != student_id {
            warn!(order_id, "confirmation attempt by non-owning student");
            return Err(PaymentError::PaymentNotFound(order_id.to_string()));
        }

        if !signature::verify(order_id, gateway_payment_id, provided_signature, &self.key_secret) {
            warn!(order_id, "signature verification failed");
            return Err(PaymentError::SignatureInvalid);
        }

        match self
            .store
            .capture_and_enroll(order_id, gateway_payment_id, provided_signature)
            .await?
        {
            CaptureOutcome::Captured {
                payment,
                enrollment_created,
            } => {
                info!(
                    payment_id = %payment.id,
                    order_id,
                    enrollment_created,
                    "payment captured"
                );
                Ok(ConfirmOutcome {
                    payment,
                    enrollment_created,
                    duplicate: false,
                })
            }
            CaptureOutcome::AlreadyCaptured { payment } => {
                info!(payment_id = %payment.id, order_id, "duplicate confirmation");
                Ok(ConfirmOutcome {
                    payment,
                    enrollment_created: false,
                    duplicate: true,
                })
            }
            CaptureOutcome::NotCapturable { status } => {
                Err(PaymentError::NotCapturable(status))
            }
        }
    }

    /// Applies an asynchronous gateway event. Unknown events are
    /// acknowledged without touching the store.
    pub async fn handle_webhook(
        &self,
        event: &WebhookEvent,
    ) -> Result<WebhookOutcome, PaymentError> {
        if let WebhookEvent::Unknown { event: name } = event {
            info!(event = %name, "ignoring unrecognized webhook event");
            return Ok(WebhookOutcome::Ignored);
        }

        let outcome = self.store.apply_webhook(event).await?;
        match &outcome {
            WebhookOutcome::Applied { new_status } => {
                info!(status = %new_status, "webhook transition applied");
            }
            WebhookOutcome::AlreadyApplied => {
                info!("webhook transition already applied");
            }
            WebhookOutcome::NotFound => {
                // Webhooks can outrun order creation or reference foreign
                // orders; acknowledged so the gateway stops retrying.
                warn!("webhook references unknown payment");
            }
            WebhookOutcome::Ignored => {}
        }
        Ok(outcome)
    }

    /// Sweeps `created` payments older than `older_than` into `failed`.
    pub async fn expire_stale_checkouts(
        &self,
        older_than: Duration,
    ) -> Result<u64, PaymentError> {
        let cutoff = Utc::now() - older_than;
        let swept = self.store.expire_stale_created(cutoff).await?;
        if swept > 0 {
            info!(swept, "expired stale checkouts");
        }
        Ok(swept)
    }

    /// Looks up a payment by its gateway order id, scoped to the owning
    /// student.
    pub async fn find_for_student(
        &self,
        student_id: UserId,
        order_id: &str,
    ) -> Result<PaymentRecord, PaymentError> {
        let payment = self
            .store
            .find_by_order_id(order_id)
            .await?
            .ok_or_else(|| PaymentError::PaymentNotFound(order_id.to_string()))?;
        if payment.student_id != student_id {
            return Err(PaymentError::PaymentNotFound(order_id.to_string()));
        }
        Ok(payment)
    }

    /// Validates a zero-price enrollment request against the catalog.
    ///
    /// Returns the pricing row so the caller can create the enrollment;
    /// paid courses must go through checkout instead.
    pub async fn check_free_enrollment(
        &self,
        student_id: UserId,
        course_id: CourseId,
    ) -> Result<CoursePricing, PaymentError> {
        let pricing = self
            .catalog
            .course_pricing(course_id)
            .await?
            .ok_or(PaymentError::CourseNotFound(course_id))?;

        if !pricing.price.is_zero() {
            return Err(PaymentError::NotFree {
                course_id,
                price: pricing.price,
            });
        }
        if self.store.is_actively_enrolled(student_id, course_id).await? {
            return Err(PaymentError::AlreadyEnrolled {
                student_id,
                course_id,
            });
        }
        Ok(pricing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayError;
    use crate::payment::types::{CoursePricing, PaymentStatus};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use coursepay_shared::types::{Currency, Money, PaymentId};
    use rust_decimal_macros::dec;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use crate::payment::store::StoreError;

    const KEY_SECRET: &str = "test_key_secret";

    struct MockGateway {
        calls: AtomicU32,
        fail: AtomicBool,
    }

    impl MockGateway {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl GatewayClient for &MockGateway {
        async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, GatewayError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail.load(Ordering::SeqCst) {
                return Err(GatewayError::Unavailable("connection refused".into()));
            }
            Ok(GatewayOrder {
                order_id: format!("order_test{n}"),
                amount_minor: request.amount_minor,
            })
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        inner: Mutex<MemoryInner>,
    }

    #[derive(Default)]
    struct MemoryInner {
        payments: Vec<PaymentRecord>,
        enrollments: HashSet<(UserId, CourseId)>,
    }

    #[async_trait]
    impl PaymentStore for &MemoryStore {
        async fn insert_created(&self, new: NewPayment) -> Result<PaymentRecord, StoreError> {
            let record = PaymentRecord {
                id: PaymentId::new(),
                student_id: new.student_id,
                instructor_id: new.instructor_id,
                course_id: new.course_id,
                amount: new.amount,
                platform_fee: new.platform_fee,
                instructor_payout: new.instructor_payout,
                status: PaymentStatus::Created,
                gateway_order_id: new.gateway_order_id,
                gateway_payment_id: None,
                gateway_signature: None,
                payout_id: None,
                created_at: Utc::now(),
                completed_at: None,
            };
            self.inner.lock().unwrap().payments.push(record.clone());
            Ok(record)
        }

        async fn find_by_order_id(
            &self,
            order_id: &str,
        ) -> Result<Option<PaymentRecord>, StoreError> {
            Ok(self
                .inner
                .lock()
                .unwrap()
                .payments
                .iter()
                .find(|p| p.gateway_order_id == order_id)
                .cloned())
        }

        async fn capture_and_enroll(
            &self,
            order_id: &str,
            gateway_payment_id: &str,
            gateway_signature: &str,
        ) -> Result<CaptureOutcome, StoreError> {
            let mut inner = self.inner.lock().unwrap();
            let Some(payment) = inner
                .payments
                .iter_mut()
                .find(|p| p.gateway_order_id == order_id)
            else {
                return Err(StoreError("payment row vanished".into()));
            };

            match payment.status {
                PaymentStatus::Captured => Ok(CaptureOutcome::AlreadyCaptured {
                    payment: payment.clone(),
                }),
                PaymentStatus::Failed | PaymentStatus::Refunded => {
                    Ok(CaptureOutcome::NotCapturable {
                        status: payment.status,
                    })
                }
                PaymentStatus::Created | PaymentStatus::Authorized => {
                    payment.status = PaymentStatus::Captured;
                    payment.gateway_payment_id = Some(gateway_payment_id.to_string());
                    payment.gateway_signature = Some(gateway_signature.to_string());
                    payment.completed_at = Some(Utc::now());
                    let captured = payment.clone();
                    let enrollment_created = inner
                        .enrollments
                        .insert((captured.student_id, captured.course_id));
                    Ok(CaptureOutcome::Captured {
                        payment: captured,
                        enrollment_created,
                    })
                }
            }
        }

        async fn apply_webhook(
            &self,
            event: &WebhookEvent,
        ) -> Result<WebhookOutcome, StoreError> {
            let Some(target) = event.target_status() else {
                return Ok(WebhookOutcome::Ignored);
            };
            let mut inner = self.inner.lock().unwrap();
            let payment = match event {
                WebhookEvent::PaymentAuthorized { order_id, .. }
                | WebhookEvent::PaymentFailed { order_id } => inner
                    .payments
                    .iter_mut()
                    .find(|p| p.gateway_order_id == *order_id),
                WebhookEvent::RefundCreated { payment_id } => inner
                    .payments
                    .iter_mut()
                    .find(|p| p.gateway_payment_id.as_deref() == Some(payment_id)),
                WebhookEvent::Unknown { .. } => None,
            };
            let Some(payment) = payment else {
                return Ok(WebhookOutcome::NotFound);
            };
            if payment.status == target || !payment.status.can_transition_to(target) {
                return Ok(WebhookOutcome::AlreadyApplied);
            }
            payment.status = target;
            if let WebhookEvent::PaymentAuthorized { payment_id, .. } = event {
                payment.gateway_payment_id = Some(payment_id.clone());
            }
            Ok(WebhookOutcome::Applied { new_status: target })
        }

        async fn is_actively_enrolled(
            &self,
            student_id: UserId,
            course_id: CourseId,
        ) -> Result<bool, StoreError> {
            Ok(self
                .inner
                .lock()
                .unwrap()
                .enrollments
                .contains(&(student_id, course_id)))
        }

        async fn expire_stale_created(
            &self,
            cutoff: DateTime<Utc>,
        ) -> Result<u64, StoreError> {
            let mut swept = 0;
            for payment in &mut self.inner.lock().unwrap().payments {
                if payment.status == PaymentStatus::Created && payment.created_at < cutoff {
                    payment.status = PaymentStatus::Failed;
                    swept += 1;
                }
            }
            Ok(swept)
        }
    }

    struct MemoryCatalog {
        courses: Vec<CoursePricing>,
    }

    #[async_trait]
    impl CourseCatalog for &MemoryCatalog {
        async fn course_pricing(
            &self,
            course_id: CourseId,
        ) -> Result<Option<CoursePricing>, StoreError> {
            Ok(self
                .courses
                .iter()
                .find(|c| c.course_id == course_id)
                .cloned())
        }
    }

    struct Fixture {
        gateway: MockGateway,
        store: MemoryStore,
        catalog: MemoryCatalog,
        student: UserId,
        instructor: UserId,
        paid_course: CourseId,
        free_course: CourseId,
    }

    impl Fixture {
        fn new() -> Self {
            let instructor = UserId::new();
            let paid_course = CourseId::new();
            let free_course = CourseId::new();
            Self {
                gateway: MockGateway::new(),
                store: MemoryStore::default(),
                catalog: MemoryCatalog {
                    courses: vec![
                        CoursePricing {
                            course_id: paid_course,
                            instructor_id: instructor,
                            price: Money::parse("299.99", Currency::Inr).unwrap(),
                            platform_fee_percent: dec!(10.00),
                        },
                        CoursePricing {
                            course_id: free_course,
                            instructor_id: instructor,
                            price: Money::zero(Currency::Inr),
                            platform_fee_percent: dec!(10.00),
                        },
                    ],
                },
                student: UserId::new(),
                instructor,
                paid_course,
                free_course,
            }
        }

        fn service(
            &self,
        ) -> PaymentService<&MockGateway, &MemoryStore, &MemoryCatalog> {
            PaymentService::new(&self.gateway, &self.store, &self.catalog, KEY_SECRET.into())
        }

        fn status_of(&self, order_id: &str) -> PaymentStatus {
            self.store
                .inner
                .lock()
                .unwrap()
                .payments
                .iter()
                .find(|p| p.gateway_order_id == order_id)
                .map(|p| p.status)
                .unwrap()
        }

        fn enrollment_count(&self) -> usize {
            self.store.inner.lock().unwrap().enrollments.len()
        }
    }

    #[tokio::test]
    async fn test_initiate_creates_payment_with_fee_split() {
        let fx = Fixture::new();
        let svc = fx.service();

        let initiated = svc.initiate(fx.student, fx.paid_course).await.unwrap();

        assert_eq!(initiated.payment.status, PaymentStatus::Created);
        assert_eq!(initiated.payment.amount.minor(), 29999);
        assert_eq!(initiated.payment.platform_fee.minor(), 3000);
        assert_eq!(initiated.payment.instructor_payout.minor(), 26999);
        assert_eq!(initiated.payment.instructor_id, fx.instructor);
        assert_eq!(initiated.payment.gateway_order_id, initiated.order.order_id);
        assert_eq!(initiated.order.amount_minor, 29999);
        assert_eq!(fx.enrollment_count(), 0);
    }

    #[tokio::test]
    async fn test_initiate_rejects_free_course_without_gateway_call() {
        let fx = Fixture::new();
        let svc = fx.service();

        let err = svc.initiate(fx.student, fx.free_course).await.unwrap_err();
        assert!(matches!(err, PaymentError::FreeCourse(_)));
        assert_eq!(fx.gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_initiate_rejects_unknown_course() {
        let fx = Fixture::new();
        let svc = fx.service();

        let err = svc.initiate(fx.student, CourseId::new()).await.unwrap_err();
        assert!(matches!(err, PaymentError::CourseNotFound(_)));
    }

    #[tokio::test]
    async fn test_initiate_rejects_already_enrolled_student() {
        let fx = Fixture::new();
        fx.store
            .inner
            .lock()
            .unwrap()
            .enrollments
            .insert((fx.student, fx.paid_course));
        let svc = fx.service();

        let err = svc.initiate(fx.student, fx.paid_course).await.unwrap_err();
        assert!(matches!(err, PaymentError::AlreadyEnrolled { .. }));
        assert_eq!(fx.gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_initiate_gateway_failure_leaves_no_record() {
        let fx = Fixture::new();
        fx.gateway.fail.store(true, Ordering::SeqCst);
        let svc = fx.service();

        let err = svc.initiate(fx.student, fx.paid_course).await.unwrap_err();
        assert!(matches!(
            err,
            PaymentError::Gateway(GatewayError::Unavailable(_))
        ));
        assert!(fx.store.inner.lock().unwrap().payments.is_empty());
    }

    #[tokio::test]
    async fn test_confirm_captures_and_enrolls() {
        let fx = Fixture::new();
        let svc = fx.service();
        let initiated = svc.initiate(fx.student, fx.paid_course).await.unwrap();
        let order_id = initiated.order.order_id;
        let sig = signature::sign(&order_id, "payment_test123", KEY_SECRET);

        let outcome = svc
            .confirm(fx.student, &order_id, "payment_test123", &sig)
            .await
            .unwrap();

        assert!(!outcome.duplicate);
        assert!(outcome.enrollment_created);
        assert_eq!(outcome.payment.status, PaymentStatus::Captured);
        assert_eq!(
            outcome.payment.gateway_payment_id.as_deref(),
            Some("payment_test123")
        );
        assert!(outcome.payment.completed_at.is_some());
        assert_eq!(fx.enrollment_count(), 1);
    }

    #[tokio::test]
    async fn test_confirm_is_idempotent() {
        let fx = Fixture::new();
        let svc = fx.service();
        let initiated = svc.initiate(fx.student, fx.paid_course).await.unwrap();
        let order_id = initiated.order.order_id;
        let sig = signature::sign(&order_id, "payment_test123", KEY_SECRET);

        let first = svc
            .confirm(fx.student, &order_id, "payment_test123", &sig)
            .await
            .unwrap();
        let second = svc
            .confirm(fx.student, &order_id, "payment_test123", &sig)
            .await
            .unwrap();

        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert!(!second.enrollment_created);
        assert_eq!(second.payment.status, PaymentStatus::Captured);
        assert_eq!(fx.enrollment_count(), 1);
    }

    #[tokio::test]
    async fn test_confirm_tampered_signature_leaves_payment_untouched() {
        let fx = Fixture::new();
        let svc = fx.service();
        let initiated = svc.initiate(fx.student, fx.paid_course).await.unwrap();
        let order_id = initiated.order.order_id;
        let sig = signature::sign(&order_id, "payment_other", KEY_SECRET);

        let err = svc
            .confirm(fx.student, &order_id, "payment_test123", &sig)
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::SignatureInvalid));
        assert_eq!(fx.status_of(&order_id), PaymentStatus::Created);
        assert_eq!(fx.enrollment_count(), 0);

        // A corrected retry still succeeds
        let good = signature::sign(&order_id, "payment_test123", KEY_SECRET);
        let outcome = svc
            .confirm(fx.student, &order_id, "payment_test123", &good)
            .await
            .unwrap();
        assert!(outcome.enrollment_created);
    }

    #[tokio::test]
    async fn test_concurrent_confirms_enroll_exactly_once() {
        let fx = Fixture::new();
        let svc = fx.service();
        let initiated = svc.initiate(fx.student, fx.paid_course).await.unwrap();
        let order_id = initiated.order.order_id;
        let sig = signature::sign(&order_id, "payment_test123", KEY_SECRET);

        let (first, second) = tokio::join!(
            svc.confirm(fx.student, &order_id, "payment_test123", &sig),
            svc.confirm(fx.student, &order_id, "payment_test123", &sig),
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        // Exactly one of the racing confirms performs the capture
        assert_eq!(
            usize::from(!first.duplicate) + usize::from(!second.duplicate),
            1
        );
        assert_eq!(fx.status_of(&order_id), PaymentStatus::Captured);
        assert_eq!(fx.enrollment_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_confirm_and_webhook_enroll_exactly_once() {
        let fx = Fixture::new();
        let svc = fx.service();
        let initiated = svc.initiate(fx.student, fx.paid_course).await.unwrap();
        let order_id = initiated.order.order_id;
        let sig = signature::sign(&order_id, "payment_test123", KEY_SECRET);

        let event = WebhookEvent::PaymentAuthorized {
            order_id: order_id.clone(),
            payment_id: "payment_test123".into(),
        };
        let (confirmed, hooked) = tokio::join!(
            svc.confirm(fx.student, &order_id, "payment_test123", &sig),
            svc.handle_webhook(&event),
        );
        let confirmed = confirmed.unwrap();
        let hooked = hooked.unwrap();

        // The webhook either lands before the capture (applied) or after
        // it (no-op); it never demotes the captured row and never adds a
        // second enrollment.
        assert!(matches!(
            hooked,
            WebhookOutcome::Applied {
                new_status: PaymentStatus::Authorized
            } | WebhookOutcome::AlreadyApplied
        ));
        assert!(!confirmed.duplicate);
        assert_eq!(fx.status_of(&order_id), PaymentStatus::Captured);
        assert_eq!(fx.enrollment_count(), 1);
    }

    #[tokio::test]
    async fn test_confirm_by_other_student_reports_not_found() {
        let fx = Fixture::new();
        let svc = fx.service();
        let initiated = svc.initiate(fx.student, fx.paid_course).await.unwrap();
        let order_id = initiated.order.order_id;
        let sig = signature::sign(&order_id, "payment_test123", KEY_SECRET);

        let err = svc
            .confirm(UserId::new(), &order_id, "payment_test123", &sig)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::PaymentNotFound(_)));
        assert_eq!(fx.status_of(&order_id), PaymentStatus::Created);
    }

    #[tokio::test]
    async fn test_confirm_unknown_order_reports_not_found() {
        let fx = Fixture::new();
        let svc = fx.service();

        let err = svc
            .confirm(fx.student, "order_missing", "payment_test123", "aa")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::PaymentNotFound(_)));
    }

    #[tokio::test]
    async fn test_confirm_after_failure_webhook_is_not_capturable() {
        let fx = Fixture::new();
        let svc = fx.service();
        let initiated = svc.initiate(fx.student, fx.paid_course).await.unwrap();
        let order_id = initiated.order.order_id;

        let outcome = svc
            .handle_webhook(&WebhookEvent::PaymentFailed {
                order_id: order_id.clone(),
            })
            .await
            .unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Applied {
                new_status: PaymentStatus::Failed
            }
        );

        let sig = signature::sign(&order_id, "payment_test123", KEY_SECRET);
        let err = svc
            .confirm(fx.student, &order_id, "payment_test123", &sig)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PaymentError::NotCapturable(PaymentStatus::Failed)
        ));
        assert_eq!(fx.enrollment_count(), 0);
    }

    #[tokio::test]
    async fn test_webhook_authorized_is_idempotent() {
        let fx = Fixture::new();
        let svc = fx.service();
        let initiated = svc.initiate(fx.student, fx.paid_course).await.unwrap();
        let event = WebhookEvent::PaymentAuthorized {
            order_id: initiated.order.order_id.clone(),
            payment_id: "payment_test123".into(),
        };

        let first = svc.handle_webhook(&event).await.unwrap();
        let second = svc.handle_webhook(&event).await.unwrap();

        assert_eq!(
            first,
            WebhookOutcome::Applied {
                new_status: PaymentStatus::Authorized
            }
        );
        assert_eq!(second, WebhookOutcome::AlreadyApplied);
        assert_eq!(fx.status_of(&initiated.order.order_id), PaymentStatus::Authorized);
    }

    #[tokio::test]
    async fn test_webhook_never_demotes_a_capture() {
        let fx = Fixture::new();
        let svc = fx.service();
        let initiated = svc.initiate(fx.student, fx.paid_course).await.unwrap();
        let order_id = initiated.order.order_id;
        let sig = signature::sign(&order_id, "payment_test123", KEY_SECRET);
        svc.confirm(fx.student, &order_id, "payment_test123", &sig)
            .await
            .unwrap();

        // Late authorization webhook arrives after the capture
        let outcome = svc
            .handle_webhook(&WebhookEvent::PaymentAuthorized {
                order_id: order_id.clone(),
                payment_id: "payment_test123".into(),
            })
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::AlreadyApplied);
        assert_eq!(fx.status_of(&order_id), PaymentStatus::Captured);
    }

    #[tokio::test]
    async fn test_webhook_refund_transitions_captured_payment() {
        let fx = Fixture::new();
        let svc = fx.service();
        let initiated = svc.initiate(fx.student, fx.paid_course).await.unwrap();
        let order_id = initiated.order.order_id;
        let sig = signature::sign(&order_id, "payment_test123", KEY_SECRET);
        svc.confirm(fx.student, &order_id, "payment_test123", &sig)
            .await
            .unwrap();

        let outcome = svc
            .handle_webhook(&WebhookEvent::RefundCreated {
                payment_id: "payment_test123".into(),
            })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::Applied {
                new_status: PaymentStatus::Refunded
            }
        );
        assert_eq!(fx.status_of(&order_id), PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn test_webhook_unknown_event_skips_store() {
        let fx = Fixture::new();
        let svc = fx.service();

        let outcome = svc
            .handle_webhook(&WebhookEvent::Unknown {
                event: "subscription.charged".into(),
            })
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_webhook_for_unknown_order_is_acknowledged() {
        let fx = Fixture::new();
        let svc = fx.service();

        let outcome = svc
            .handle_webhook(&WebhookEvent::PaymentFailed {
                order_id: "order_foreign".into(),
            })
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_expire_sweeps_only_stale_created() {
        let fx = Fixture::new();
        let svc = fx.service();
        let stale = svc.initiate(fx.student, fx.paid_course).await.unwrap();
        {
            let mut inner = fx.store.inner.lock().unwrap();
            inner.payments[0].created_at = Utc::now() - Duration::hours(2);
        }
        let other_student = UserId::new();
        let fresh = svc.initiate(other_student, fx.paid_course).await.unwrap();

        let swept = svc
            .expire_stale_checkouts(Duration::minutes(30))
            .await
            .unwrap();

        assert_eq!(swept, 1);
        assert_eq!(fx.status_of(&stale.order.order_id), PaymentStatus::Failed);
        assert_eq!(fx.status_of(&fresh.order.order_id), PaymentStatus::Created);
    }

    #[tokio::test]
    async fn test_free_enrollment_check() {
        let fx = Fixture::new();
        let svc = fx.service();

        let pricing = svc
            .check_free_enrollment(fx.student, fx.free_course)
            .await
            .unwrap();
        assert!(pricing.price.is_zero());

        let err = svc
            .check_free_enrollment(fx.student, fx.paid_course)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::NotFree { .. }));
    }
}
