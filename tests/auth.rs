use std::sync::Arc;

use devmarket_client::{
    api::ApiClient,
    auth::{AuthService, LoginForm, MemoryTokenStore, RegisterForm, TokenStore},
    config::ApiConfig,
    error::{AppError, NetworkError},
};
use serde_json::json;
use wiremock::{
    matchers::{body_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn auth_service(server: &MockServer) -> (AuthService, Arc<MemoryTokenStore>) {
    let api = ApiClient::new(&ApiConfig {
        base_url: format!("{}/api", server.uri()),
        timeout_secs: 5,
    })
    .expect("api client");
    let tokens = Arc::new(MemoryTokenStore::new());
    (AuthService::new(api, tokens.clone()), tokens)
}

fn register_form() -> RegisterForm {
    RegisterForm {
        name: "Jane Doe".to_string(),
        email: "jane@example.com".to_string(),
        password: "hunter22".to_string(),
        confirm_password: "hunter22".to_string(),
    }
}

#[tokio::test]
async fn test_register_password_mismatch_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let (auth, _) = auth_service(&server);
    let mut form = register_form();
    form.confirm_password = "hunter23".to_string();

    let err = auth.register(&form).await.unwrap_err();
    let fields = err.field_errors().expect("field errors");
    assert_eq!(fields.get("confirmPassword"), Some("Passwords do not match"));
    assert_eq!(fields.len(), 1);
}

#[tokio::test]
async fn test_register_sends_name_email_password_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .and(body_json(json!({
            "name": "Jane Doe",
            "email": "jane@example.com",
            "password": "hunter22"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let (auth, tokens) = auth_service(&server);
    auth.register(&register_form()).await.unwrap();
    // registration never logs the user in
    assert_eq!(tokens.load().await.unwrap(), None);
}

#[tokio::test]
async fn test_register_surfaces_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"message": "Email already registered"})),
        )
        .mount(&server)
        .await;

    let (auth, _) = auth_service(&server);
    let err = auth.register(&register_form()).await.unwrap_err();
    assert_eq!(err.user_message(), "Email already registered");
}

#[tokio::test]
async fn test_login_rejected_with_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid email or password"})),
        )
        .mount(&server)
        .await;

    let (auth, tokens) = auth_service(&server);
    let err = auth
        .login(&LoginForm::new("jane@example.com", "wrongpass"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ServiceError { status: 401, .. }));
    assert_eq!(err.user_message(), "Invalid email or password");
    assert_eq!(tokens.load().await.unwrap(), None);
}

#[tokio::test]
async fn test_login_without_readable_error_is_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let (auth, _) = auth_service(&server);
    let err = auth
        .login(&LoginForm::new("jane@example.com", "hunter22"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NetworkError(NetworkError::Status(500))));
    assert_eq!(err.user_message(), "Network error. Please try again.");
}

#[tokio::test]
async fn test_login_with_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jwt": "tok"})))
        .mount(&server)
        .await;

    let (auth, tokens) = auth_service(&server);
    let err = auth
        .login(&LoginForm::new("jane@example.com", "hunter22"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::NetworkError(NetworkError::MalformedResponse(_))
    ));
    assert_eq!(tokens.load().await.unwrap(), None);
}
