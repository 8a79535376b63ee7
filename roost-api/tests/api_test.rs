use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use roost_api::state::AuthConfig;
use roost_api::{app, auth, AppState};
use roost_catalog::{
    DiscountRule, LedgerConfig, MemoryInventoryLedger, PriceEngine, RoomTypeEntry, StaticCatalog,
    StaticDiscountValidator,
};
use roost_core::catalog::CatalogProvider;
use roost_core::identity::Role;
use roost_reservation::{
    EngineConfig, MockPaymentGateway, PaymentOrchestrator, ReservationEngine,
};
use roost_store::MemoryHoldStore;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    hotel_id: Uuid,
    room_type_id: Uuid,
}

fn test_app(total_units: i32, rules: Vec<DiscountRule>) -> TestApp {
    let hotel_id = Uuid::new_v4();
    let room_type_id = Uuid::new_v4();
    let catalog: Arc<dyn CatalogProvider> = Arc::new(
        StaticCatalog::new().with_room_type(room_type_id, RoomTypeEntry::new(total_units, 100_000)),
    );
    let engine = Arc::new(ReservationEngine::new(
        Arc::new(MemoryHoldStore::new()),
        Arc::new(MemoryInventoryLedger::new(
            catalog.clone(),
            LedgerConfig::default(),
        )),
        catalog,
        Arc::new(StaticDiscountValidator::new(rules)),
        PriceEngine::default(),
        EngineConfig::default(),
    ));
    let payments = Arc::new(PaymentOrchestrator::new(
        Arc::new(MockPaymentGateway::succeeding()),
        engine.clone(),
    ));

    let state = AppState {
        engine,
        payments,
        auth: AuthConfig {
            secret: SECRET.to_string(),
        },
    };

    TestApp {
        router: app(state),
        hotel_id,
        room_type_id,
    }
}

fn bearer(account_id: &str) -> String {
    let token = auth::issue_token(SECRET, account_id, Role::Customer, 3600).unwrap();
    format!("Bearer {token}")
}

impl TestApp {
    async fn call(
        &self,
        method: Method,
        uri: &str,
        auth_header: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(value) = auth_header {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn create_body(&self) -> Value {
        json!({
            "hotel_id": self.hotel_id,
            "room_type_id": self.room_type_id,
            "stay": { "check_in": "2026-09-10", "check_out": "2026-09-12" },
            "room_count": 1,
            "guest_count": 2,
        })
    }

    async fn create(&self, auth_header: &str) -> Value {
        let (status, body) = self
            .call(
                Method::POST,
                "/v1/reservations",
                Some(auth_header),
                Some(self.create_body()),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    async fn attach(&self, auth_header: &str, id: &str) -> Value {
        let (status, body) = self
            .call(
                Method::PATCH,
                &format!("/v1/reservations/{id}/guest-and-payment"),
                Some(auth_header),
                Some(json!({
                    "guest_contact": {
                        "full_name": "Ada Guest",
                        "email": "ada@example.com",
                        "phone": "+1-555-0100",
                    },
                    "payment_method": "CARD",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }
}

#[tokio::test]
async fn test_create_and_rehydrate_reservation() {
    let app = test_app(5, vec![]);
    let token = bearer("acct-1");

    let created = app.create(&token).await;
    assert_eq!(created["status"], "CREATED");
    assert_eq!(created["price_snapshot"]["subtotal"], 200_000);
    assert_eq!(created["price_snapshot"]["total"], 220_000);
    assert!(created["seconds_to_expiry"].as_i64().unwrap() > 0);

    let id = created["id"].as_str().unwrap();
    let (status, fetched) = app
        .call(
            Method::GET,
            &format!("/v1/reservations/{id}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], created["id"]);
    assert_eq!(fetched["version"], created["version"]);
}

#[tokio::test]
async fn test_missing_or_invalid_token_is_unauthorized() {
    let app = test_app(5, vec![]);

    let (status, _) = app
        .call(
            Method::POST,
            "/v1/reservations",
            None,
            Some(app.create_body()),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call(
            Method::POST,
            "/v1/reservations",
            Some("Bearer not-a-jwt"),
            Some(app.create_body()),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_capacity_exhaustion_maps_to_conflict() {
    let app = test_app(1, vec![]);
    let token = bearer("acct-1");

    app.create(&token).await;
    let (status, body) = app
        .call(
            Method::POST,
            "/v1/reservations",
            Some(&token),
            Some(app.create_body()),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "CAPACITY_EXCEEDED");
    assert_eq!(
        body["error"]["detail"]["unavailable_dates"]
            .as_array()
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn test_checkout_resolves_via_payment_webhook() {
    let app = test_app(5, vec![]);
    let token = bearer("acct-1");

    let created = app.create(&token).await;
    let id = created["id"].as_str().unwrap().to_string();
    app.attach(&token, &id).await;

    let (status, intent) = app
        .call(
            Method::POST,
            &format!("/v1/reservations/{id}/payment-intent"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{intent}");
    assert_eq!(intent["amount"], 220_000);
    let intent_id = intent["intent_id"].as_str().unwrap().to_string();

    // No bearer token: the webhook route is authenticated by the gateway
    // callback contract, not by user identity.
    let (status, _) = app
        .call(
            Method::POST,
            "/v1/webhooks/payments",
            None,
            Some(json!({
                "id": "evt_1",
                "type": "payment_intent.succeeded",
                "data": { "object": { "id": intent_id, "status": "succeeded" } },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, fetched) = app
        .call(
            Method::GET,
            &format!("/v1/reservations/{id}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(fetched["status"], "CONFIRMED");
    assert_eq!(fetched["expires_at"], Value::Null);
}

#[tokio::test]
async fn test_webhook_acknowledges_settled_reservation() {
    let app = test_app(5, vec![]);
    let token = bearer("acct-1");

    let created = app.create(&token).await;
    let id = created["id"].as_str().unwrap().to_string();
    app.attach(&token, &id).await;

    let (status, intent) = app
        .call(
            Method::POST,
            &format!("/v1/reservations/{id}/payment-intent"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{intent}");
    let intent_id = intent["intent_id"].as_str().unwrap().to_string();

    // The customer cancels before the gateway callback lands.
    let (status, _) = app
        .call(
            Method::POST,
            &format!("/v1/reservations/{id}/cancel"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // The late success callback hits a settled reservation. That outcome is
    // definitive, so the webhook must acknowledge it; a 5xx would make the
    // gateway redeliver forever.
    let (status, _) = app
        .call(
            Method::POST,
            "/v1/webhooks/payments",
            None,
            Some(json!({
                "id": "evt_late",
                "type": "payment_intent.succeeded",
                "data": { "object": { "id": intent_id, "status": "succeeded" } },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, fetched) = app
        .call(
            Method::GET,
            &format!("/v1/reservations/{id}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(fetched["status"], "CANCELLED");
    assert_eq!(fetched["cancel_reason"], "USER_REQUESTED");
}

#[tokio::test]
async fn test_discount_code_endpoints_update_snapshot() {
    let app = test_app(5, vec![DiscountRule::percent("SAVE10", 1_000)]);
    let token = bearer("acct-1");

    let created = app.create(&token).await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/v1/reservations/{id}/discount-codes"),
            Some(&token),
            Some(json!({ "code": "SAVE10" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["price_snapshot"]["total"], 198_000);

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/v1/reservations/{id}/discount-codes"),
            Some(&token),
            Some(json!({ "code": "BOGUS" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], "DISCOUNT_REJECTED");
    assert_eq!(body["error"]["detail"]["code"], "BOGUS");

    let (status, body) = app
        .call(
            Method::DELETE,
            &format!("/v1/reservations/{id}/discount-codes/SAVE10"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["price_snapshot"]["total"], 220_000);
}

#[tokio::test]
async fn test_foreign_reservation_reads_as_not_found() {
    let app = test_app(5, vec![]);
    let owner = bearer("acct-1");
    let stranger = bearer("acct-2");

    let created = app.create(&owner).await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = app
        .call(
            Method::GET,
            &format!("/v1/reservations/{id}"),
            Some(&stranger),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "NOT_FOUND");
}

#[tokio::test]
async fn test_cancel_endpoint_is_idempotent() {
    let app = test_app(5, vec![]);
    let token = bearer("acct-1");

    let created = app.create(&token).await;
    let id = created["id"].as_str().unwrap().to_string();

    for _ in 0..2 {
        let (status, body) = app
            .call(
                Method::POST,
                &format!("/v1/reservations/{id}/cancel"),
                Some(&token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["status"], "CANCELLED");
        assert_eq!(body["cancel_reason"], "USER_REQUESTED");
    }
}
