//! Reconciliation of gateway callbacks.
//!
//! The browser return redirect and the server-to-server IPN carry the same
//! signed parameters and both land in [`PaymentReconciler::handle_callback`].
//! A payment row moves to a terminal status at most once; every later
//! delivery of the same callback reports [`CallbackOutcome::AlreadyProcessed`].

use common::{
    OrderId, OrderPaymentStatus, OrderStatus, PaymentMethod, PaymentStatus, ReservationId,
};
use fanout::EventName;
use gateway::{CallbackParams, IpnResponse, TxnRef, VerifiedCallback};
use store::{Payment, PaymentTarget, UnitOfWork};

use crate::order::ops;
use crate::reservation::engine::{self as reservations, load_reservation};
use crate::{DomainError, EngineContext, Outbox, Result};

/// What a callback did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    OrderPaid(OrderId),
    OrderPaymentFailed(OrderId),
    DepositCompleted(ReservationId),
    DepositFailed(ReservationId),
    /// The payment had already reached `status`; nothing changed.
    AlreadyProcessed {
        reference: String,
        status: PaymentStatus,
    },
}

impl CallbackOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CallbackOutcome::OrderPaid(_) => "order_paid",
            CallbackOutcome::OrderPaymentFailed(_) => "order_failed",
            CallbackOutcome::DepositCompleted(_) => "deposit_completed",
            CallbackOutcome::DepositFailed(_) => "deposit_failed",
            CallbackOutcome::AlreadyProcessed { .. } => "already_processed",
        }
    }

    /// True when the money arrived, now or on an earlier delivery.
    pub fn is_success(&self) -> bool {
        match self {
            CallbackOutcome::OrderPaid(_) | CallbackOutcome::DepositCompleted(_) => true,
            CallbackOutcome::AlreadyProcessed { status, .. } => {
                *status == PaymentStatus::Completed
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentReconciler {
    ctx: EngineContext,
}

impl PaymentReconciler {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Verifies and applies a gateway callback.
    #[tracing::instrument(skip_all)]
    pub async fn handle_callback(&self, params: &CallbackParams) -> Result<CallbackOutcome> {
        let result = self.reconcile(params).await;
        let label = match &result {
            Ok(outcome) => outcome.label(),
            Err(DomainError::GatewaySignatureInvalid) => "invalid_signature",
            Err(DomainError::NotFound { .. }) => "not_found",
            Err(_) => "error",
        };
        metrics::counter!("payment_callbacks_total", "outcome" => label).increment(1);
        if let Err(err) = &result {
            if err.is_internal() {
                tracing::error!(error = %err, "payment callback failed");
            } else {
                tracing::warn!(error = %err, "payment callback rejected");
            }
        }
        result
    }

    async fn reconcile(&self, params: &CallbackParams) -> Result<CallbackOutcome> {
        let callback = self.ctx.gateway.verify_callback(params)?;
        let reference = callback.reference.to_string();
        let now = self.ctx.now();

        let mut uow = self.ctx.begin().await?;
        let mut outbox = Outbox::new();

        let payment = match uow.get_payment_by_ref(&reference).await? {
            Some(payment) => payment,
            None => recover_payment(uow.as_mut(), &callback, &reference, now).await?,
        };
        if payment.status.is_terminal() {
            tracing::info!(
                reference = %reference,
                status = %payment.status,
                "callback already processed"
            );
            return Ok(CallbackOutcome::AlreadyProcessed {
                reference,
                status: payment.status,
            });
        }
        if let Some(amount) = callback.amount {
            if amount != payment.amount {
                return Err(DomainError::validation(format!(
                    "callback amount {amount} does not match payment {}",
                    payment.amount
                )));
            }
        }

        let status = if callback.success {
            PaymentStatus::Completed
        } else {
            PaymentStatus::Failed
        };
        let settled = uow
            .settle_payment(&reference, status, callback.transaction_no.as_deref(), now)
            .await?;
        if !settled {
            return Ok(CallbackOutcome::AlreadyProcessed { reference, status });
        }

        let outcome = match (payment.target, callback.success) {
            (PaymentTarget::Order(order_id), true) => {
                let mut order = ops::load_order(uow.as_mut(), order_id).await?;
                let payable = order.status == OrderStatus::Paid
                    || order.status.can_transition_to(OrderStatus::Paid);
                if payable {
                    ops::mark_paid(uow.as_mut(), &mut order, payment.method, now, &mut outbox)
                        .await?;
                } else {
                    tracing::warn!(
                        order_id = %order.id,
                        status = %order.status,
                        "payment received for an order that cannot be paid"
                    );
                }
                CallbackOutcome::OrderPaid(order_id)
            }
            (PaymentTarget::Order(order_id), false) => {
                let mut order = ops::load_order(uow.as_mut(), order_id).await?;
                // Another attempt still in flight decides the order's outcome.
                let in_flight = uow
                    .payments_for(PaymentTarget::Order(order_id))
                    .await?
                    .iter()
                    .any(|p| p.status == PaymentStatus::Pending && p.transaction_ref != reference);
                if order.status == OrderStatus::WaitingPayment && !in_flight {
                    order.payment_status = OrderPaymentStatus::Failed;
                    order.updated_at = now;
                    uow.update_order(&order).await?;
                    outbox.order(EventName::OrderUpdated, &order);
                }
                CallbackOutcome::OrderPaymentFailed(order_id)
            }
            (PaymentTarget::Reservation(reservation_id), true) => {
                reservations::deposit_succeeded(uow.as_mut(), reservation_id, now, &mut outbox)
                    .await?;
                CallbackOutcome::DepositCompleted(reservation_id)
            }
            (PaymentTarget::Reservation(reservation_id), false) => {
                reservations::deposit_failed(uow.as_mut(), reservation_id, &mut outbox).await?;
                CallbackOutcome::DepositFailed(reservation_id)
            }
        };

        uow.commit().await?;
        tracing::info!(
            reference = %reference,
            response_code = %callback.response_code,
            outcome = outcome.label(),
            "payment callback applied"
        );
        self.ctx.flush(outbox).await;
        Ok(outcome)
    }
}

/// First reference at or after `reference`'s instant that no payment row uses
/// yet. Two attempts within the same millisecond get consecutive stamps.
pub(crate) async fn unused_reference(
    uow: &mut dyn UnitOfWork,
    reference: TxnRef,
) -> Result<TxnRef> {
    let mut candidate = reference;
    while uow.get_payment_by_ref(&candidate.to_string()).await?.is_some() {
        candidate = candidate.reissued_at_ms(candidate.issued_at_ms() + 1);
    }
    Ok(candidate)
}

/// Recreates the pending row for a reference whose row is gone, as long as
/// the target it names still exists.
async fn recover_payment(
    uow: &mut dyn UnitOfWork,
    callback: &VerifiedCallback,
    reference: &str,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Payment> {
    let (target, amount) = match callback.reference {
        TxnRef::Order { order_id, .. } => {
            let order = ops::load_order(uow, order_id).await?;
            (PaymentTarget::Order(order.id), order.final_amount)
        }
        TxnRef::ReservationDeposit { reservation_id, .. } => {
            let reservation = load_reservation(uow, reservation_id).await?;
            (
                PaymentTarget::Reservation(reservation.id),
                reservation.deposit_amount,
            )
        }
    };
    let payment = Payment::pending(
        target,
        callback.amount.unwrap_or(amount),
        PaymentMethod::Vnpay,
        reference,
        now,
    );
    uow.insert_payment(&payment).await?;
    tracing::warn!(reference, "payment row recreated from callback");
    Ok(payment)
}

/// Acknowledgement body for the IPN endpoint.
pub fn ipn_response(result: &Result<CallbackOutcome>) -> IpnResponse {
    match result {
        Ok(_) => IpnResponse::confirmed(),
        Err(DomainError::GatewaySignatureInvalid) => IpnResponse::invalid_signature(),
        Err(DomainError::NotFound { .. }) => IpnResponse::not_found(),
        Err(_) => IpnResponse::unhandled(),
    }
}

/// Where the browser goes after the return redirect.
pub fn return_redirect_url(client_url: &str, result: &Result<CallbackOutcome>) -> String {
    let base = client_url.trim_end_matches('/');
    match result {
        Ok(outcome) if outcome.is_success() => {
            let target = match outcome {
                CallbackOutcome::OrderPaid(id) => format!("type=order&id={id}"),
                CallbackOutcome::DepositCompleted(id) => format!("type=reservation&id={id}"),
                CallbackOutcome::AlreadyProcessed { reference, .. } => {
                    format!("ref={}", urlencode(reference))
                }
                _ => String::new(),
            };
            format!("{base}/payment/success?{target}")
        }
        Ok(_) => format!("{base}/payment/failed?reason=payment_failed"),
        Err(DomainError::GatewaySignatureInvalid) => {
            format!("{base}/payment/failed?reason=invalid_signature")
        }
        Err(DomainError::NotFound { .. }) => format!("{base}/payment/failed?reason=not_found"),
        Err(_) => format!("{base}/payment/failed?reason=error"),
    }
}

fn urlencode(raw: &str) -> String {
    gateway::signing::encode_component(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway::GatewayError;

    #[test]
    fn ipn_codes_follow_the_gateway_contract() {
        let ok: Result<CallbackOutcome> = Ok(CallbackOutcome::OrderPaid(OrderId::new()));
        assert_eq!(ipn_response(&ok).rsp_code, "00");

        let again: Result<CallbackOutcome> = Ok(CallbackOutcome::AlreadyProcessed {
            reference: "ORD_x".into(),
            status: PaymentStatus::Failed,
        });
        assert_eq!(ipn_response(&again).rsp_code, "00");

        let bad_sig: Result<CallbackOutcome> = Err(GatewayError::InvalidSignature.into());
        assert_eq!(ipn_response(&bad_sig).rsp_code, "97");

        let missing: Result<CallbackOutcome> = Err(DomainError::not_found("order", "1"));
        assert_eq!(ipn_response(&missing).rsp_code, "01");

        let unknown: Result<CallbackOutcome> =
            Err(GatewayError::UnrecognizedReference("XYZ_1".into()).into());
        assert_eq!(ipn_response(&unknown).rsp_code, "02");
    }

    #[test]
    fn redirect_points_at_success_or_failure_page() {
        let id = ReservationId::new();
        let ok: Result<CallbackOutcome> = Ok(CallbackOutcome::DepositCompleted(id));
        assert_eq!(
            return_redirect_url("http://localhost:3000/", &ok),
            format!("http://localhost:3000/payment/success?type=reservation&id={id}")
        );

        let failed: Result<CallbackOutcome> = Ok(CallbackOutcome::DepositFailed(id));
        assert_eq!(
            return_redirect_url("http://localhost:3000", &failed),
            "http://localhost:3000/payment/failed?reason=payment_failed"
        );

        let bad_sig: Result<CallbackOutcome> = Err(DomainError::GatewaySignatureInvalid);
        assert!(return_redirect_url("http://c", &bad_sig).ends_with("reason=invalid_signature"));
    }
}
