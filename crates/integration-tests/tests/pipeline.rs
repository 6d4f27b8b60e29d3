//! Request pipeline behaviour over real HTTP.

use std::sync::Arc;
use std::time::Duration;

use bazaar_client::session::{MemoryStore, SessionStore, keys};
use bazaar_client::{ClientError, Session};
use bazaar_core::{CartItemId, ProductId};
use bazaar_integration_tests::{
    TEST_TOKEN, TestBackend, cart_line, envelope, error_envelope, signed_in_session,
};
use serde_json::json;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_bearer_token_and_request_id_are_sent() {
    let backend = TestBackend::start().await;
    let (session, _store) = signed_in_session().await;
    let (storefront, _rx) = backend.storefront(session);

    Mock::given(method("GET"))
        .and(path("/api/carts"))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .and(header_exists("x-request-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "items": [cart_line("i1", "p1", 12, 2)]
        }))))
        .expect(1)
        .mount(&backend.server)
        .await;

    let cart = storefront.cart().load().await.expect("cart loads");
    assert_eq!(cart.total_items(), 2);
}

#[tokio::test]
async fn test_guest_requests_carry_no_token() {
    let backend = TestBackend::start().await;
    let (storefront, _rx) = backend.storefront(Session::new(Arc::new(MemoryStore::new())));

    Mock::given(method("GET"))
        .and(path("/api/shops"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!([
            { "_id": "s1", "name": "Loom & Co", "followers": [] }
        ]))))
        .expect(1)
        .mount(&backend.server)
        .await;

    let shops = storefront.shops().shops().await.expect("shops load");
    assert_eq!(shops.len(), 1);

    let requests = backend.server.received_requests().await.expect("recording on");
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let backend = TestBackend::start().await;
    let (session, _store) = signed_in_session().await;
    let (storefront, _rx) = backend.storefront(session);

    Mock::given(method("PUT"))
        .and(path("/api/carts/item/i1"))
        .respond_with(ResponseTemplate::new(422).set_body_json(error_envelope("Only 3 left in stock")))
        .expect(1)
        .mount(&backend.server)
        .await;

    let err = storefront
        .cart()
        .update_quantity(&CartItemId::new("i1"), 5)
        .await
        .expect_err("rejected");
    assert_eq!(err.status(), Some(422));
    assert_eq!(err.user_message(), "Only 3 left in stock");
}

#[tokio::test]
async fn test_server_faults_are_not_retried_and_use_generic_message() {
    let backend = TestBackend::start().await;
    let (session, _store) = signed_in_session().await;
    let (storefront, _rx) = backend.storefront(session);

    Mock::given(method("POST"))
        .and(path("/api/carts/add"))
        .respond_with(ResponseTemplate::new(500).set_body_json(error_envelope("TypeError: x is undefined")))
        .expect(1)
        .mount(&backend.server)
        .await;

    let err = storefront
        .cart()
        .add(&ProductId::new("p1"), bazaar_client::AddToCart::default())
        .await
        .expect_err("server fault");
    assert!(err.is_server_fault());
    assert!(!err.user_message().contains("TypeError"));
}

#[tokio::test]
async fn test_timeouts_are_retried_up_to_the_cap() {
    let backend = TestBackend::start().await;
    let (session, _store) = signed_in_session().await;
    let (storefront, _rx) = backend.storefront(session);

    Mock::given(method("GET"))
        .and(path("/api/wishlist"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!({ "products": [] })))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&backend.server)
        .await;

    let err = storefront.wishlist().load().await.expect_err("times out");
    assert!(matches!(err, ClientError::Transport(_)));

    let requests = backend.server.received_requests().await.expect("recording on");
    assert_eq!(requests.len(), 3);

    // One logical call: every attempt carries the same request id.
    let ids: Vec<_> = requests
        .iter()
        .map(|r| r.headers.get("x-request-id").cloned())
        .collect();
    assert!(ids.iter().all(|id| id.is_some() && *id == ids[0]));
}

#[tokio::test]
async fn test_unauthorized_tears_down_session() {
    let backend = TestBackend::start().await;
    let (session, store) = signed_in_session().await;
    let (storefront, _rx) = backend.storefront(session);

    Mock::given(method("GET"))
        .and(path("/api/users/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(error_envelope("Token expired")))
        .expect(1)
        .mount(&backend.server)
        .await;

    let err = storefront.profile().await.expect_err("unauthorized");
    assert!(matches!(err, ClientError::Unauthorized { .. }));
    assert!(!storefront.session().is_authenticated().await);
    assert!(store.get(keys::TOKEN).await.unwrap().is_none());
    assert!(store.get(keys::USER).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unauthorized_on_login_route_keeps_session() {
    let backend = TestBackend::start().await;
    let (session, _store) = signed_in_session().await;
    session.set_route("/login");
    let (storefront, _rx) = backend.storefront(session);

    Mock::given(method("GET"))
        .and(path("/api/users/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(error_envelope("Token expired")))
        .mount(&backend.server)
        .await;

    assert!(storefront.profile().await.is_err());
    assert!(storefront.session().is_authenticated().await);
}
