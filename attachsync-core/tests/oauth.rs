use attachsync_core::OAuthClient;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn password_grant_posts_form_data() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("username=jane%40example.com"))
        .and(body_string_contains("password=hunter2"))
        .and(body_string_contains("client_id=client-id"))
        .and(body_string_contains("client_secret=secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token",
            "token_type": "bearer",
            "expires_in": 28800,
            "refresh_token": "refresh"
        })))
        .mount(&server)
        .await;

    let client = OAuthClient::with_base_url(&server.uri(), "client-id", "secret").unwrap();
    let token = client
        .password_grant("jane@example.com", "hunter2")
        .await
        .unwrap();

    assert_eq!(token.access_token, "token");
    assert_eq!(token.token_type, "bearer");
    assert_eq!(token.expires_in, Some(28800));
}

#[tokio::test]
async fn password_grant_rejection_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant"
        })))
        .mount(&server)
        .await;

    let client = OAuthClient::with_base_url(&server.uri(), "client-id", "secret").unwrap();
    let err = client
        .password_grant("jane@example.com", "wrong")
        .await
        .expect_err("expected rejection");

    assert!(err.is_rejected_credentials());
}
