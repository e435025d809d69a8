//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{Duration, Utc};
use common::{Money, UserId};
use domain::EngineContext;
use gateway::{CallbackParams, VnpayConfig, VnpayGateway, signing};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{Dish, InMemoryStore, Store, Table};
use tower::ServiceExt;

const CLIENT_URL: &str = "http://localhost:5173";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    router: axum::Router,
    store: InMemoryStore,
    gateway: VnpayGateway,
    staff: UserId,
}

impl TestApp {
    fn new() -> Self {
        let store = InMemoryStore::new();
        let gateway = VnpayGateway::new(VnpayConfig::new(
            "TESTCODE",
            "test-secret",
            "http://localhost:3000/api/payments/vnpay/return",
        ));
        let ctx = EngineContext::new(Arc::new(store.clone()), Arc::new(gateway.clone()));
        let state = Arc::new(api::AppState::new(ctx, CLIENT_URL));
        Self {
            router: api::create_app(state, get_metrics_handle()),
            store,
            gateway,
            staff: UserId::new(),
        }
    }

    async fn table(&self, deposit: i64) -> Table {
        let table = Table::new("A1", 4).with_deposit(Money::vnd(deposit));
        let mut uow = self.store.begin().await.unwrap();
        uow.insert_table(&table).await.unwrap();
        uow.commit().await.unwrap();
        table
    }

    async fn dish(&self, price: i64) -> Dish {
        let dish = Dish::new("Pho bo", Money::vnd(price));
        let mut uow = self.store.begin().await.unwrap();
        uow.insert_dish(&dish).await.unwrap();
        uow.commit().await.unwrap();
        dish
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    fn as_staff(&self, method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
        request(method, uri, body.is_some())
            .header("x-user-id", self.staff.to_string())
            .header("x-user-role", "employee")
            .body(body_of(body))
            .unwrap()
    }

    /// A signed gateway callback query string.
    fn callback_query(&self, reference: &str, amount: i64, code: &str) -> String {
        let mut params = CallbackParams::new();
        params.insert("vnp_Amount".into(), (amount * 100).to_string());
        params.insert("vnp_ResponseCode".into(), code.into());
        params.insert("vnp_TmnCode".into(), "TESTCODE".into());
        params.insert("vnp_TransactionNo".into(), "14226112".into());
        params.insert("vnp_TxnRef".into(), reference.into());
        self.gateway.sign_params(&mut params).unwrap();
        let hash = params[signing::SECURE_HASH].clone();
        let query = signing::canonical_query(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        format!("{query}&{}={hash}", signing::SECURE_HASH)
    }
}

fn request(method: &str, uri: &str, json: bool) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    if json {
        builder.header("content-type", "application/json")
    } else {
        builder
    }
}

fn body_of(body: Option<serde_json::Value>) -> Body {
    match body {
        Some(json) => Body::from(serde_json::to_string(&json).unwrap()),
        None => Body::empty(),
    }
}

fn as_customer(user: UserId, method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    request(method, uri, body.is_some())
        .header("x-user-id", user.to_string())
        .body(body_of(body))
        .unwrap()
}

fn as_guest(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    request(method, uri, body.is_some()).body(body_of(body)).unwrap()
}

fn table_resource(table: &Table) -> serde_json::Value {
    serde_json::json!({ "kind": "table", "id": table.id })
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();
    let (status, json) = app.send(as_guest("GET", "/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(as_guest("GET", "/metrics", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
}

mod orders {
    use super::*;

    #[tokio::test]
    async fn test_walk_in_order_and_second_seating_conflict() {
        let app = TestApp::new();
        let table = app.table(0).await;
        let dish = app.dish(45_000).await;
        let body = serde_json::json!({
            "resource": table_resource(&table),
            "items": [{ "dish_id": dish.id, "quantity": 2 }],
        });

        let (status, json) = app
            .send(as_guest("POST", "/api/orders", Some(body.clone())))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["order"]["status"], "dining");
        assert_eq!(json["items"][0]["quantity"], 2);
        let order_id = json["order"]["id"].as_str().unwrap().to_string();

        let (status, json) = app
            .send(as_guest("GET", &format!("/api/orders/{order_id}"), None))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["order"]["id"], order_id.as_str());

        let (status, json) = app.send(as_guest("POST", "/api/orders", Some(body))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(json["error"].as_str().is_some());
        assert!(json["conflict"]["start"].as_str().is_some());

        let (status, json) = app
            .send(as_guest("GET", &format!("/api/tables/{}/order", table.id), None))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["order"]["id"], order_id.as_str());
    }

    #[tokio::test]
    async fn test_unknown_order_is_404() {
        let app = TestApp::new();
        let (status, json) = app
            .send(app.as_staff("GET", &format!("/api/orders/{}", UserId::new()), None))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_malformed_identity_is_400() {
        let app = TestApp::new();
        let request = Request::builder()
            .uri("/health")
            .header("x-user-id", "nobody")
            .body(Body::empty())
            .unwrap();
        // Health does not look at identity.
        let (status, _) = app.send(request).await;
        assert_eq!(status, StatusCode::OK);

        let request = Request::builder()
            .uri(format!("/api/orders/{}", UserId::new()))
            .header("x-user-id", "nobody")
            .body(Body::empty())
            .unwrap();
        let (status, _) = app.send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_other_customers_order_is_forbidden() {
        let app = TestApp::new();
        let table = app.table(0).await;
        let owner = UserId::new();
        let mut uow = app.store.begin().await.unwrap();
        let mut user = store::User::customer("owner");
        user.id = owner;
        uow.insert_user(&user).await.unwrap();
        uow.commit().await.unwrap();

        let (status, json) = app
            .send(as_customer(
                owner,
                "POST",
                "/api/orders",
                Some(serde_json::json!({ "resource": table_resource(&table) })),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let order_id = json["order"]["id"].as_str().unwrap().to_string();

        let (status, _) = app
            .send(as_customer(
                UserId::new(),
                "GET",
                &format!("/api/orders/{order_id}"),
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .send(as_guest("GET", &format!("/api/orders/{order_id}"), None))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_cash_payment_flow() {
        let app = TestApp::new();
        let table = app.table(0).await;
        let dish = app.dish(120_000).await;

        let (_, json) = app
            .send(app.as_staff(
                "POST",
                "/api/orders",
                Some(serde_json::json!({
                    "resource": table_resource(&table),
                    "items": [{ "dish_id": dish.id, "quantity": 1 }],
                })),
            ))
            .await;
        let order_id = json["order"]["id"].as_str().unwrap().to_string();
        let item_id = json["items"][0]["id"].as_str().unwrap().to_string();

        // Customers cannot drive the kitchen.
        let (status, _) = app
            .send(as_customer(
                UserId::new(),
                "PATCH",
                &format!("/api/orders/items/{item_id}/status"),
                Some(serde_json::json!({ "status": "completed" })),
            ))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, json) = app
            .send(app.as_staff(
                "PATCH",
                &format!("/api/orders/items/{item_id}/status"),
                Some(serde_json::json!({ "status": "completed" })),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["order"]["total_amount"], 120_000);

        let (status, json) = app
            .send(app.as_staff(
                "POST",
                &format!("/api/orders/{order_id}/payment/cash"),
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["order"]["status"], "waiting_payment");

        let (status, json) = app
            .send(app.as_staff(
                "POST",
                &format!("/api/orders/{order_id}/payment/cash/confirm"),
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["order"]["status"], "paid");
        assert_eq!(json["order"]["payment_status"], "paid");
    }

    #[tokio::test]
    async fn test_gateway_payment_and_ipn() {
        let app = TestApp::new();
        let table = app.table(0).await;
        let dish = app.dish(80_000).await;

        let (_, json) = app
            .send(app.as_staff(
                "POST",
                "/api/orders",
                Some(serde_json::json!({
                    "resource": table_resource(&table),
                    "items": [{ "dish_id": dish.id, "quantity": 1 }],
                })),
            ))
            .await;
        let order_id = json["order"]["id"].as_str().unwrap().to_string();
        let item_id = json["items"][0]["id"].as_str().unwrap().to_string();
        app.send(app.as_staff(
            "PATCH",
            &format!("/api/orders/items/{item_id}/status"),
            Some(serde_json::json!({ "status": "completed" })),
        ))
        .await;

        let (status, json) = app
            .send(app.as_staff(
                "POST",
                &format!("/api/orders/{order_id}/payment/vnpay"),
                Some(serde_json::json!({ "bank_code": "NCB" })),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        let reference = json["transaction_ref"].as_str().unwrap().to_string();
        assert!(reference.starts_with(&format!("ORD_{order_id}_")));
        assert!(
            json["payment_url"]
                .as_str()
                .unwrap()
                .contains("vnp_BankCode=NCB")
        );

        let query = app.callback_query(&reference, 80_000, "00");
        let (status, json) = app
            .send(as_guest("GET", &format!("/api/payments/vnpay/ipn?{query}"), None))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({ "RspCode": "00", "Message": "Confirm Success" }));

        // The browser return arrives after the IPN and finds it settled.
        let response = app
            .router
            .clone()
            .oneshot(as_guest(
                "GET",
                &format!("/api/payments/vnpay/return?{query}"),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with(&format!("{CLIENT_URL}/payment/success")));

        let (_, json) = app
            .send(app.as_staff("GET", &format!("/api/orders/{order_id}"), None))
            .await;
        assert_eq!(json["order"]["status"], "paid");
    }
}

mod payments {
    use super::*;

    #[tokio::test]
    async fn test_ipn_with_bad_signature() {
        let app = TestApp::new();
        let query = app
            .callback_query(&format!("ORD_{}_1", UserId::new()), 10_000, "00")
            .replace("vnp_ResponseCode=00", "vnp_ResponseCode=24");

        let (status, json) = app
            .send(as_guest("POST", &format!("/api/payments/vnpay/ipn?{query}"), None))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["RspCode"], "97");
    }

    #[tokio::test]
    async fn test_ipn_accepts_form_encoded_post() {
        let app = TestApp::new();
        let query = app.callback_query(&format!("ORD_{}_1", UserId::new()), 10_000, "00");

        let request = Request::builder()
            .method("POST")
            .uri("/api/payments/vnpay/ipn")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(query))
            .unwrap();
        let (status, json) = app.send(request).await;
        assert_eq!(status, StatusCode::OK);
        // Signature checked out; the order just does not exist.
        assert_eq!(json["RspCode"], "01");
    }

    #[tokio::test]
    async fn test_return_for_unknown_target_redirects_to_failure() {
        let app = TestApp::new();
        let query = app.callback_query(&format!("ORD_{}_1", UserId::new()), 10_000, "00");

        let response = app
            .router
            .clone()
            .oneshot(as_guest(
                "GET",
                &format!("/api/payments/vnpay/return?{query}"),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION].to_str().unwrap(),
            format!("{CLIENT_URL}/payment/failed?reason=not_found")
        );
    }
}

mod reservations {
    use super::*;

    #[tokio::test]
    async fn test_deposit_reservation_confirmed_by_ipn() {
        let app = TestApp::new();
        let table = app.table(50_000).await;
        let customer = UserId::new();
        let mut user = store::User::customer("diner");
        user.id = customer;
        let mut uow = app.store.begin().await.unwrap();
        uow.insert_user(&user).await.unwrap();
        uow.commit().await.unwrap();

        let at = Utc::now() + Duration::days(2);
        let (status, json) = app
            .send(as_customer(
                customer,
                "POST",
                "/api/reservations",
                Some(serde_json::json!({
                    "resource": table_resource(&table),
                    "reservation_time": at,
                    "num_people": 2,
                })),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["requires_payment"], true);
        assert_eq!(json["reservation"]["status"], "pending");
        let id = json["reservation"]["id"].as_str().unwrap().to_string();
        let reference = json["payment"]["transaction_ref"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(reference.starts_with(&format!("RES_{id}_")));

        // The same slot is now taken.
        let (status, _) = app
            .send(app.as_staff(
                "POST",
                "/api/reservations",
                Some(serde_json::json!({
                    "resource": table_resource(&table),
                    "reservation_time": at + Duration::minutes(30),
                    "num_people": 2,
                })),
            ))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let query = app.callback_query(&reference, 50_000, "00");
        let (_, json) = app
            .send(as_guest("GET", &format!("/api/payments/vnpay/ipn?{query}"), None))
            .await;
        assert_eq!(json["RspCode"], "00");

        let (status, json) = app
            .send(as_customer(customer, "GET", &format!("/api/reservations/{id}"), None))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["reservation"]["status"], "confirmed");
        assert_eq!(json["order"]["status"], "pending");

        let (status, json) = app
            .send(as_guest("GET", &format!("/api/reservations/{id}/can-modify"), None))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["can_modify"], true);

        let (status, json) = app
            .send(app.as_staff(
                "GET",
                &format!("/api/tables/{}/reservations", table.id),
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_staff_booking_cancel_and_rules() {
        let app = TestApp::new();
        let table = app.table(0).await;

        let (status, _) = app
            .send(as_guest(
                "POST",
                "/api/reservations",
                Some(serde_json::json!({
                    "resource": table_resource(&table),
                    "reservation_time": Utc::now() + Duration::days(1),
                    "num_people": 2,
                })),
            ))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app
            .send(app.as_staff(
                "POST",
                "/api/reservations",
                Some(serde_json::json!({
                    "resource": table_resource(&table),
                    "reservation_time": Utc::now() + Duration::days(1),
                    "num_people": 9,
                })),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = app
            .send(app.as_staff(
                "POST",
                "/api/reservations",
                Some(serde_json::json!({
                    "resource": table_resource(&table),
                    "reservation_time": Utc::now() + Duration::days(1),
                    "num_people": 4,
                })),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["requires_payment"], false);
        assert_eq!(json["reservation"]["status"], "confirmed");
        let id = json["reservation"]["id"].as_str().unwrap().to_string();

        // Confirmed reservations never go back to pending.
        let (status, _) = app
            .send(app.as_staff(
                "PATCH",
                &format!("/api/reservations/{id}/status"),
                Some(serde_json::json!({ "status": "pending" })),
            ))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, json) = app
            .send(app.as_staff("POST", &format!("/api/reservations/{id}/cancel"), None))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["reservation"]["status"], "cancelled");
        assert_eq!(json["order"]["status"], "cancelled");
    }
}
