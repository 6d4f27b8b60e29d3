//! Sign-in persistence across restarts.

use bazaar_integration_tests::{TEST_TOKEN, TestBackend, envelope, error_envelope, persisted_token};
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

fn auth_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(envelope(json!({
        "token": TEST_TOKEN,
        "user": { "_id": "u1", "name": "Ada", "email": "ada@example.com", "role": "customer" }
    })))
}

async fn mount_empty_collections(backend: &TestBackend) {
    Mock::given(method("GET"))
        .and(path("/api/carts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({ "items": [] }))))
        .mount(&backend.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/wishlist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({ "products": [] }))))
        .mount(&backend.server)
        .await;
}

#[tokio::test]
async fn test_login_survives_restart() {
    let backend = TestBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let session_file = dir.path().join("nested").join("session.json");

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({ "email": "ada@example.com", "password": "hunter22" })))
        .respond_with(auth_response())
        .expect(1)
        .mount(&backend.server)
        .await;
    mount_empty_collections(&backend).await;

    let (storefront, _rx) = backend.connect(&session_file).await.unwrap();
    storefront
        .login("ada@example.com", &SecretString::from("hunter22"))
        .await
        .unwrap();
    assert_eq!(persisted_token(&session_file).await.as_deref(), Some(TEST_TOKEN));
    drop(storefront);

    let (restarted, _rx) = backend.connect(&session_file).await.unwrap();
    assert!(restarted.session().is_authenticated().await);
    assert_eq!(restarted.session().user().await.unwrap().name, "Ada");
}

#[tokio::test]
async fn test_logout_clears_session_file() {
    let backend = TestBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let session_file = dir.path().join("session.json");

    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(auth_response())
        .mount(&backend.server)
        .await;
    mount_empty_collections(&backend).await;

    let (storefront, _rx) = backend.connect(&session_file).await.unwrap();
    storefront
        .register("Ada", "ada@example.com", &SecretString::from("hunter22"))
        .await
        .unwrap();
    assert!(storefront.logout().await);

    assert!(persisted_token(&session_file).await.is_none());
    let (restarted, _rx) = backend.connect(&session_file).await.unwrap();
    assert!(!restarted.session().is_authenticated().await);
}

#[tokio::test]
async fn test_bad_credentials_do_not_create_session() {
    let backend = TestBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let session_file = dir.path().join("session.json");

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(error_envelope("Invalid email or password")))
        .mount(&backend.server)
        .await;

    let (storefront, _rx) = backend.connect(&session_file).await.unwrap();
    let err = storefront
        .login("ada@example.com", &SecretString::from("wrong"))
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Invalid email or password");
    assert!(persisted_token(&session_file).await.is_none());
}

#[tokio::test]
async fn test_corrupt_session_file_starts_signed_out() {
    let backend = TestBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let session_file = dir.path().join("session.json");
    tokio::fs::write(&session_file, "{not json").await.unwrap();

    let (storefront, _rx) = backend.connect(&session_file).await.unwrap();
    assert!(!storefront.session().is_authenticated().await);

    let contents = tokio::fs::read_to_string(&session_file).await.unwrap();
    assert!(serde_json::from_str::<serde_json::Value>(&contents).is_ok());
}
