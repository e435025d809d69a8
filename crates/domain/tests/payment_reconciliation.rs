//! Gateway callback handling: idempotency, rejection paths and side effects.

mod support;

use chrono::Duration;
use common::{
    ItemStatus, Money, OrderId, OrderPaymentStatus, OrderStatus, PaymentStatus, Ranking,
    ReservationStatus, UserId,
};
use domain::order::{CreateOrder, RequestPayment};
use domain::{
    CallbackOutcome, CreateReservation, DomainError, NotificationKind, ipn_response,
    return_redirect_url,
};
use fanout::EventName;
use store::{PaymentTarget, Store};
use support::Harness;

/// A served order for `price` awaiting a gateway payment.
async fn billed_order(h: &Harness, price: i64) -> (OrderId, String, UserId) {
    let table = h.table(4, 0).await;
    let dish = h.dish("Hotpot", price).await;
    let (user, customer) = h.customer(Ranking::Regular).await;
    let orders = &h.engines.orders;

    let view = orders
        .create_order(&customer, CreateOrder::new(table.id).with_item(dish.id, 1))
        .await
        .unwrap();
    orders
        .update_item_status(&h.staff, view.items[0].id, ItemStatus::Completed)
        .await
        .unwrap();
    let link = orders
        .request_payment(&customer, RequestPayment::new(view.order.id, "127.0.0.1"))
        .await
        .unwrap();
    (view.order.id, link.transaction_ref, user.id)
}

async fn payment_status(h: &Harness, reference: &str) -> PaymentStatus {
    let mut uow = h.store.begin().await.unwrap();
    uow.get_payment_by_ref(reference)
        .await
        .unwrap()
        .unwrap()
        .status
}

mod orders {
    use super::*;

    #[tokio::test]
    async fn repeated_ipn_pays_once_and_credits_loyalty_once() {
        let h = Harness::new();
        let (order_id, reference, user_id) = billed_order(&h, 100_000).await;
        let params = h.callback(&reference, Money::vnd(100_000), "00");
        let payments = &h.engines.payments;

        let first = payments.handle_callback(&params).await;
        assert_eq!(first.as_ref().ok(), Some(&CallbackOutcome::OrderPaid(order_id)));
        assert_eq!(ipn_response(&first).rsp_code, "00");

        let second = payments.handle_callback(&params).await;
        assert_eq!(
            second.as_ref().ok(),
            Some(&CallbackOutcome::AlreadyProcessed {
                reference: reference.clone(),
                status: PaymentStatus::Completed,
            })
        );
        assert_eq!(ipn_response(&second).rsp_code, "00");

        assert_eq!(payment_status(&h, &reference).await, PaymentStatus::Completed);
        assert_eq!(h.user(user_id).await.points, 100);
        let view = h.engines.orders.get_order(&h.staff, order_id).await.unwrap();
        assert_eq!(view.order.status, OrderStatus::Paid);
        assert_eq!(view.order.payment_status, OrderPaymentStatus::Paid);

        let paid_events = h
            .publisher
            .names()
            .await
            .into_iter()
            .filter(|n| *n == EventName::OrderPaymentCompleted)
            .count();
        assert_eq!(paid_events, 1);
    }

    #[tokio::test]
    async fn retry_gets_a_fresh_reference_and_stale_failure_cannot_undo_it() {
        let h = Harness::new();
        let (order_id, first_ref, _) = billed_order(&h, 80_000).await;
        let payments = &h.engines.payments;
        let failure = h.callback(&first_ref, Money::vnd(80_000), "24");

        let outcome = payments.handle_callback(&failure).await.unwrap();
        assert_eq!(outcome, CallbackOutcome::OrderPaymentFailed(order_id));
        let view = h.engines.orders.get_order(&h.staff, order_id).await.unwrap();
        assert_eq!(view.order.status, OrderStatus::WaitingPayment);
        assert_eq!(view.order.payment_status, OrderPaymentStatus::Failed);
        assert_eq!(payment_status(&h, &first_ref).await, PaymentStatus::Failed);

        // Same clock instant, so the new reference has to be bumped.
        let retry = h
            .engines
            .orders
            .request_payment(&h.staff, RequestPayment::new(order_id, "127.0.0.1"))
            .await
            .unwrap();
        assert_ne!(retry.transaction_ref, first_ref);
        assert!(retry.transaction_ref.starts_with(&format!("ORD_{order_id}_")));
        assert_eq!(payment_status(&h, &first_ref).await, PaymentStatus::Failed);
        assert_eq!(payment_status(&h, &retry.transaction_ref).await, PaymentStatus::Pending);

        // The gateway re-delivers the old failure after the retry started.
        let stale = payments.handle_callback(&failure).await.unwrap();
        assert_eq!(
            stale,
            CallbackOutcome::AlreadyProcessed {
                reference: first_ref.clone(),
                status: PaymentStatus::Failed,
            }
        );
        assert_eq!(payment_status(&h, &retry.transaction_ref).await, PaymentStatus::Pending);

        let outcome = payments
            .handle_callback(&h.callback(&retry.transaction_ref, Money::vnd(80_000), "00"))
            .await
            .unwrap();
        assert_eq!(outcome, CallbackOutcome::OrderPaid(order_id));
        let view = h.engines.orders.get_order(&h.staff, order_id).await.unwrap();
        assert_eq!(view.order.status, OrderStatus::Paid);

        let mut uow = h.store.begin().await.unwrap();
        let rows = uow
            .payments_for(PaymentTarget::Order(order_id))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn completed_payment_cannot_be_requested_again() {
        let h = Harness::new();
        let (order_id, reference, _) = billed_order(&h, 80_000).await;
        h.engines
            .payments
            .handle_callback(&h.callback(&reference, Money::vnd(80_000), "00"))
            .await
            .unwrap();

        let err = h
            .engines
            .orders
            .request_payment(&h.staff, RequestPayment::new(order_id, "127.0.0.1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[tokio::test]
    async fn lost_payment_row_is_rebuilt_from_the_reference() {
        let h = Harness::new();
        let table = h.table(4, 0).await;
        let dish = h.dish("Hotpot", 60_000).await;
        let orders = &h.engines.orders;
        let view = orders
            .create_order(&h.staff, CreateOrder::new(table.id).with_item(dish.id, 1))
            .await
            .unwrap();
        orders
            .update_item_status(&h.staff, view.items[0].id, ItemStatus::Completed)
            .await
            .unwrap();
        orders
            .request_cash_payment(&h.staff, view.order.id)
            .await
            .unwrap();

        let reference = format!("ORD_{}_{}", view.order.id, h.now().timestamp_millis());
        let outcome = h
            .engines
            .payments
            .handle_callback(&h.callback(&reference, Money::vnd(60_000), "00"))
            .await
            .unwrap();

        assert_eq!(outcome, CallbackOutcome::OrderPaid(view.order.id));
        assert_eq!(payment_status(&h, &reference).await, PaymentStatus::Completed);
    }
}

mod rejections {
    use super::*;

    #[tokio::test]
    async fn bad_signature_changes_nothing() {
        let h = Harness::new();
        let (_, reference, _) = billed_order(&h, 50_000).await;
        let mut params = h.callback(&reference, Money::vnd(50_000), "00");
        params.insert("vnp_ResponseCode".into(), "00 ".into());

        let result = h.engines.payments.handle_callback(&params).await;
        assert!(matches!(result, Err(DomainError::GatewaySignatureInvalid)));
        assert_eq!(ipn_response(&result).rsp_code, "97");
        assert_eq!(payment_status(&h, &reference).await, PaymentStatus::Pending);

        params.remove("vnp_SecureHash");
        let result = h.engines.payments.handle_callback(&params).await;
        assert_eq!(ipn_response(&result).rsp_code, "97");
    }

    #[tokio::test]
    async fn amount_mismatch_is_not_applied() {
        let h = Harness::new();
        let (_, reference, _) = billed_order(&h, 50_000).await;

        let result = h
            .engines
            .payments
            .handle_callback(&h.callback(&reference, Money::vnd(5_000), "00"))
            .await;
        assert_eq!(ipn_response(&result).rsp_code, "02");
        assert_eq!(payment_status(&h, &reference).await, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_target_and_unknown_kind() {
        let h = Harness::new();
        let payments = &h.engines.payments;

        let missing = format!("ORD_{}_1", OrderId::new());
        let result = payments
            .handle_callback(&h.callback(&missing, Money::vnd(10_000), "00"))
            .await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
        assert_eq!(ipn_response(&result).rsp_code, "01");
        assert_eq!(
            return_redirect_url("http://localhost:3000", &result),
            "http://localhost:3000/payment/failed?reason=not_found"
        );

        let result = payments
            .handle_callback(&h.callback("GIFT_42", Money::vnd(10_000), "00"))
            .await;
        assert_eq!(ipn_response(&result).rsp_code, "02");
    }
}

mod deposits {
    use super::*;

    #[tokio::test]
    async fn failed_deposit_keeps_reservation_pending_for_a_retry() {
        let h = Harness::new();
        let table = h.table(4, 50_000).await;
        let (_, customer) = h.customer(Ranking::Regular).await;
        let reservations = &h.engines.reservations;
        let payments = &h.engines.payments;

        let created = reservations
            .create_reservation(
                &customer,
                CreateReservation::new(table.id, h.now() + Duration::hours(3), 2),
            )
            .await
            .unwrap();
        let id = created.reservation.id;
        let first_ref = created.payment.unwrap().transaction_ref;

        let outcome = payments
            .handle_callback(&h.callback(&first_ref, Money::vnd(50_000), "24"))
            .await
            .unwrap();
        assert_eq!(outcome, CallbackOutcome::DepositFailed(id));
        let view = reservations.get_reservation(&customer, id).await.unwrap();
        assert_eq!(view.reservation.status, ReservationStatus::Pending);
        assert!(
            h.notifier
                .kinds()
                .await
                .contains(&NotificationKind::DepositFailed)
        );

        h.advance(2);
        let retry = reservations
            .request_deposit_payment(&customer, id, "127.0.0.1", None)
            .await
            .unwrap();
        assert_ne!(retry.transaction_ref, first_ref);
        assert_eq!(h.store.payment_count().await, 2);

        let result = payments
            .handle_callback(&h.callback(&retry.transaction_ref, Money::vnd(50_000), "00"))
            .await;
        assert!(
            return_redirect_url("http://localhost:3000", &result)
                .starts_with("http://localhost:3000/payment/success?type=reservation")
        );
        let view = reservations.get_reservation(&customer, id).await.unwrap();
        assert_eq!(view.reservation.status, ReservationStatus::Confirmed);
        assert!(view.order.is_some());

        let err = reservations
            .request_deposit_payment(&customer, id, "127.0.0.1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[tokio::test]
    async fn late_deposit_for_cancelled_reservation_is_recorded_only() {
        let h = Harness::new();
        let table = h.table(4, 50_000).await;
        let (_, customer) = h.customer(Ranking::Regular).await;
        let reservations = &h.engines.reservations;

        let created = reservations
            .create_reservation(
                &customer,
                CreateReservation::new(table.id, h.now() + Duration::hours(3), 2),
            )
            .await
            .unwrap();
        let id = created.reservation.id;
        let reference = created.payment.unwrap().transaction_ref;
        reservations.cancel(&customer, id).await.unwrap();

        let outcome = h
            .engines
            .payments
            .handle_callback(&h.callback(&reference, Money::vnd(50_000), "00"))
            .await
            .unwrap();

        assert_eq!(outcome, CallbackOutcome::DepositCompleted(id));
        assert_eq!(payment_status(&h, &reference).await, PaymentStatus::Completed);
        let view = reservations.get_reservation(&customer, id).await.unwrap();
        assert_eq!(view.reservation.status, ReservationStatus::Cancelled);
        assert!(view.order.is_none());
    }
}
