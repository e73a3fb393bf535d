//! Payment webhook router: auth, status codes and notifications

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{RecordingNotifier, TestDb};
use telegen::web::{create_router, WebhookState};
use telegencore::billing::signature::{cryptobot_signature, CRYPTOBOT_SIGNATURE_HEADER};
use telegencore::models::{PaymentMethod, TariffCode};
use telegencore::storage::billing::{self, get_payment_by_order_id, get_period_for, get_tariff_by_code, NewPayment};
use telegencore::get_connection;

const CRYPTO_TOKEN: &str = "12345:crypto-pay-token";
const MONO_SECRET: &str = "mono-shared-secret";

struct Fixture {
    db: TestDb,
    notifier: Arc<RecordingNotifier>,
    router: Router,
}

fn fixture() -> Fixture {
    let db = TestDb::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let router = create_router(WebhookState {
        pool: Arc::clone(&db.pool),
        notifier: notifier.clone(),
        monobank_secret: Some(SecretString::from(MONO_SECRET.to_string())),
        cryptobot_token: Some(SecretString::from(CRYPTO_TOKEN.to_string())),
    });
    Fixture { db, notifier, router }
}

/// Pending basic/1-month payment for a fresh user
fn pending_payment(db: &TestDb, telegram_id: i64, method: PaymentMethod, order_id: &str, external_id: &str) {
    let user = db.user(telegram_id);
    let conn = get_connection(&db.pool).unwrap();
    let tariff = get_tariff_by_code(&conn, TariffCode::Basic).unwrap().unwrap();
    let period = get_period_for(&conn, tariff.id, 1).unwrap().unwrap();
    billing::create_payment(
        &conn,
        &NewPayment {
            user_id: user.id,
            amount: 29_900,
            payment_method: method,
            tariff_period_id: Some(period.id),
            order_id,
            external_id: Some(external_id),
            pay_url: Some("https://pay.example/x"),
        },
    )
    .unwrap();
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8_lossy(&body).to_string())
}

fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn signed_cryptobot(body: &Value, signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook/cryptobot/")
        .header("content-type", "application/json")
        .header(CRYPTOBOT_SIGNATURE_HEADER, signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_and_monobank_liveness_check() {
    let f = fixture();

    let (status, body) = send(&f.router, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "ok"));

    let (status, body) = send(&f.router, Request::get("/webhook/monobank/").body(Body::empty()).unwrap()).await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "OK"));
}

#[tokio::test]
async fn test_other_methods_are_rejected() {
    let f = fixture();

    for (method, uri) in [("PUT", "/webhook/monobank/"), ("GET", "/webhook/cryptobot/"), ("DELETE", "/webhook/cryptobot/")] {
        let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let (status, body) = send(&f.router, request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{} {}", method, uri);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"error": "Method not allowed"}));
    }
}

#[tokio::test]
async fn test_monobank_requires_token() {
    let f = fixture();
    let update = json!({"invoiceId": "inv-1", "status": "success"});

    let (status, _) = send(&f.router, post("/webhook/monobank/", &update)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&f.router, post("/webhook/monobank/?token=wrong", &update)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_monobank_success_activates_and_notifies() {
    let f = fixture();
    pending_payment(&f.db, 7001, PaymentMethod::Monobank, "order-7001", "inv-7001");
    let uri = format!("/webhook/monobank/?token={}", MONO_SECRET);

    let (status, body) = send(&f.router, post(&uri, &json!({"invoiceId": "inv-7001", "status": "success"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"status": "ok"}));

    let conn = get_connection(&f.db.pool).unwrap();
    assert!(get_payment_by_order_id(&conn, "order-7001").unwrap().unwrap().is_successful);

    let sent = f.notifier.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 7001);
    assert!(sent[0].1.contains("Оплата успішна"));
}

#[tokio::test]
async fn test_monobank_bad_payload_and_unknown_payment() {
    let f = fixture();
    let uri = format!("/webhook/monobank/?token={}", MONO_SECRET);

    let request = Request::builder()
        .method("POST")
        .uri(&uri)
        .body(Body::from("not json"))
        .unwrap();
    let (status, body) = send(&f.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(serde_json::from_str::<Value>(&body).unwrap()["error"].is_string());

    let (status, _) = send(&f.router, post(&uri, &json!({"invoiceId": "missing", "reference": "nope", "status": "success"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cryptobot_signature_is_checked() {
    let f = fixture();
    let update = json!({"update_type": "invoice_paid", "payload": {"invoice_id": 1, "status": "paid"}});

    let (status, _) = send(&f.router, post("/webhook/cryptobot/", &update)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&f.router, signed_cryptobot(&update, "deadbeef")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cryptobot_paid_invoice_activates() {
    let f = fixture();
    pending_payment(&f.db, 7002, PaymentMethod::Cryptobot, "order-7002", "9001");
    let update = json!({
        "update_type": "invoice_paid",
        "payload": {"invoice_id": 9001, "status": "paid", "hidden_message": "Order order-7002"}
    });
    let signature = cryptobot_signature(CRYPTO_TOKEN, update.to_string().as_bytes()).unwrap();

    let (status, _) = send(&f.router, signed_cryptobot(&update, &signature)).await;
    assert_eq!(status, StatusCode::OK);

    let conn = get_connection(&f.db.pool).unwrap();
    assert!(get_payment_by_order_id(&conn, "order-7002").unwrap().unwrap().is_successful);
    assert_eq!(f.notifier.sent.lock().unwrap().len(), 1);

    // a repeated delivery is accepted without a second notification
    let (status, _) = send(&f.router, signed_cryptobot(&update, &signature)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(f.notifier.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cryptobot_without_token_is_unauthorized() {
    let db = TestDb::new();
    let router = create_router(WebhookState {
        pool: Arc::clone(&db.pool),
        notifier: Arc::new(RecordingNotifier::default()),
        monobank_secret: None,
        cryptobot_token: None,
    });
    let update = json!({"update_type": "invoice_paid"});

    let (status, _) = send(&router, signed_cryptobot(&update, "00")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
