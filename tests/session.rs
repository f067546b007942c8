use std::path::Path;
use std::sync::Arc;

use devmarket_client::{
    auth::FileTokenStore,
    catalog::{Attachment, Tool, ToolId, UploadForm},
    config::{ApiConfig, DownloadConfig, StorageConfig},
    entitlement::simulated::{SimulatedDownloads, SimulatedPayments},
    entitlement::{Plan, Quota},
    error::{AppError, AuthError, EntitlementError},
    LoginForm, Session, Settings, TokenStore,
};
use serde_json::json;
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn settings(server: &MockServer, dir: &Path) -> Settings {
    Settings {
        environment: "test".to_string(),
        api: ApiConfig {
            base_url: format!("{}/api", server.uri()),
            timeout_secs: 5,
        },
        storage: StorageConfig {
            token_path: dir.join("storage.json"),
            token_key: "jwt".to_string(),
        },
        downloads: DownloadConfig {
            quota_warning_ratio: 0.8,
            simulated_latency_ms: 0,
        },
    }
}

fn session(server: &MockServer, dir: &Path) -> Session {
    Session::new(
        settings(server, dir),
        Arc::new(SimulatedPayments::default()),
        Arc::new(SimulatedDownloads::default()),
    )
    .expect("session builds")
}

async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": token })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_snapshot(server: &MockServer, token: &str, used: u32, limit: i64) {
    Mock::given(method("GET"))
        .and(path("/api/account/snapshot"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {
                "id": "u-1",
                "name": "John Doe",
                "plan": "Pro",
                "quota": {"used": used, "limit": limit, "resetDate": "2024-10-01"}
            },
            "entitlements": [
                {"toolId": 1, "purchased": true, "status": "active", "downloadCount": 3}
            ]
        })))
        .mount(server)
        .await;
}

fn upload_form() -> UploadForm {
    UploadForm {
        tool_name: "Rust Lint Pack".to_string(),
        description: "Opinionated clippy configuration".to_string(),
        price: "9.99".to_string(),
        category: "Code Libraries".to_string(),
        file: Some(Attachment::new("lint-pack.zip", b"zip-bytes".to_vec())),
        image: Some(Attachment::new("cover.png", b"png-bytes".to_vec())),
    }
}

#[test_log::test(tokio::test)]
async fn test_login_syncs_quota_and_persists_token() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login(&server, "tok-1").await;
    mount_snapshot(&server, "tok-1", 9, 10).await;

    let session = session(&server, dir.path());
    session
        .tracker
        .load_catalog(vec![Tool::new(1, "React Component Generator", 29.99)])
        .await;

    let user = session
        .login(&LoginForm::new("john@example.com", "hunter22"))
        .await
        .unwrap();
    assert_eq!(user.plan, Plan::Pro);
    assert_eq!(session.tracker.quota().await.unwrap().used, 9);
    assert!(session.quota_warning().await);

    // persisted under the fixed key
    let stored = FileTokenStore::new(dir.path().join("storage.json"), "jwt");
    assert_eq!(stored.load().await.unwrap().as_deref(), Some("tok-1"));

    // ownership came from the snapshot, not the catalog
    let entitlement = session.tracker.attempt_download(ToolId(1)).await.unwrap();
    assert_eq!(entitlement.download_count, 4);
    assert_eq!(session.tracker.quota().await.unwrap(), {
        let mut quota = Quota::limited(10, 10);
        quota.reset_date = chrono::NaiveDate::from_ymd_opt(2024, 10, 1);
        quota
    });
    assert!(matches!(
        session.tracker.attempt_download(ToolId(1)).await,
        Err(AppError::EntitlementError(EntitlementError::QuotaExceeded))
    ));

    session.logout().await.unwrap();
    assert_eq!(stored.load().await.unwrap(), None);
    assert!(matches!(
        session.tracker.attempt_download(ToolId(1)).await,
        Err(AppError::AuthError(AuthError::Unauthenticated))
    ));
}

#[tokio::test]
async fn test_restore_and_refresh_from_persisted_token() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_snapshot(&server, "opaque-token", 2, -1).await;

    FileTokenStore::new(dir.path().join("storage.json"), "jwt")
        .store("opaque-token")
        .await
        .unwrap();

    let session = session(&server, dir.path());
    let user = session.restore().await.unwrap().expect("session restored");
    assert_eq!(user.quota, Quota {
        used: 2,
        limit: devmarket_client::entitlement::QuotaLimit::Unlimited,
        reset_date: chrono::NaiveDate::from_ymd_opt(2024, 10, 1),
    });
    assert!(!session.quota_warning().await);

    let refreshed = session.refresh().await.unwrap();
    assert_eq!(refreshed.id, "u-1");
}

#[tokio::test]
async fn test_upload_sends_multipart_with_bearer_token() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login(&server, "tok-9").await;
    mount_snapshot(&server, "tok-9", 0, 10).await;
    Mock::given(method("POST"))
        .and(path("/api/tools/upload"))
        .and(header("authorization", "Bearer tok-9"))
        .and(body_string_contains("name=\"toolName\""))
        .and(body_string_contains("Rust Lint Pack"))
        .and(body_string_contains("name=\"file\"; filename=\"lint-pack.zip\""))
        .and(body_string_contains("name=\"image\"; filename=\"cover.png\""))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let session = session(&server, dir.path());
    session
        .login(&LoginForm::new("john@example.com", "hunter22"))
        .await
        .unwrap();

    session.upload(upload_form()).await.unwrap();
}

#[tokio::test]
async fn test_upload_without_token_sends_nothing() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .and(path("/api/tools/upload"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let session = session(&server, dir.path());
    let err = session.upload(upload_form()).await.unwrap_err();
    assert!(matches!(err, AppError::AuthError(AuthError::Unauthenticated)));

    let mut invalid = upload_form();
    invalid.file = None;
    invalid.price = "0".to_string();
    let err = session.upload(invalid).await.unwrap_err();
    let fields = err.field_errors().expect("validation runs first");
    assert!(fields.contains("file"));
    assert!(fields.contains("price"));
}

#[tokio::test]
async fn test_upload_failure_message() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("POST"))
        .and(path("/api/tools/upload"))
        .respond_with(
            ResponseTemplate::new(413).set_body_json(json!({"message": "File too large"})),
        )
        .mount(&server)
        .await;

    FileTokenStore::new(dir.path().join("storage.json"), "jwt")
        .store("tok-3")
        .await
        .unwrap();

    let session = session(&server, dir.path());
    let err = session.upload(upload_form()).await.unwrap_err();
    assert_eq!(err.user_message(), "File too large");
}
