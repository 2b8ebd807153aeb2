//! End-to-end authorization tests
//!
//! Drives the full router with `oneshot` against a seeded in-memory store
//! and checks each guard flow at the HTTP boundary.

use api_server::context::{ApiKeyClaims, Identity};
use api_server::repository::{InMemoryStore, ResourceRecord};
use api_server::routes::create_router;
use api_server::AppState;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use shelf_authz::{Checker, PermissionSet, PolicyDefinition, Resource};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

struct Fixture {
    store: Arc<InMemoryStore>,
    project: Uuid,
    other_project: Uuid,
    file: ResourceRecord,
    foreign_file: ResourceRecord,
}

const VIEWER: &str = "viewer-token";
const EDITOR: &str = "editor-token";
const ADMIN: &str = "admin-token";
const OUTSIDER: &str = "outsider-token";
const READ_KEY: &str = "read-key";
const FULL_KEY: &str = "full-key";
const FOREIGN_KEY: &str = "foreign-key";

fn file_in(project_id: Uuid, name: &str) -> ResourceRecord {
    ResourceRecord {
        id: Uuid::new_v4(),
        project_id,
        kind: Resource::new("file"),
        name: name.to_string(),
    }
}

fn key(project_id: Uuid, perms: &[&str]) -> Identity {
    Identity::ApiKey(ApiKeyClaims {
        key_id: Uuid::new_v4(),
        project_id,
        permissions: perms.iter().map(|p| (*p).into()).collect::<PermissionSet>(),
    })
}

fn setup() -> (Router, Fixture) {
    let store = Arc::new(InMemoryStore::new());
    let project = Uuid::new_v4();
    let other_project = Uuid::new_v4();

    for (token, role) in [(VIEWER, "viewer"), (EDITOR, "editor"), (ADMIN, "admin")] {
        let user_id = Uuid::new_v4();
        store.add_member(project, user_id, role);
        store.add_credential(token, Identity::User { user_id });
    }
    let outsider = Uuid::new_v4();
    store.add_member(other_project, outsider, "admin");
    store.add_credential(OUTSIDER, Identity::User { user_id: outsider });

    store.add_credential(READ_KEY, key(project, &["read"]));
    store.add_credential(FULL_KEY, key(project, &["read", "write", "delete"]));
    store.add_credential(FOREIGN_KEY, key(other_project, &["read", "write", "delete"]));

    let file = file_in(project, "plan.md");
    let foreign_file = file_in(other_project, "secret.md");
    store.add_resource(file.clone());
    store.add_resource(foreign_file.clone());

    let checker = Arc::new(Checker::new(PolicyDefinition::builtin()).unwrap());
    let state = Arc::new(AppState::in_memory(checker, store.clone()));

    (
        create_router(state),
        Fixture {
            store,
            project,
            other_project,
            file,
            foreign_file,
        },
    )
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<&str>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_missing_credential_is_unauthorized() {
    let (app, fx) = setup();

    let response = send(&app, Method::GET, &format!("/api/v1/projects/{}", fx.project), None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app, Method::GET, "/api/v1/policy", Some("bogus"), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_x_api_key_header_is_accepted() {
    let (app, fx) = setup();

    let request = Request::builder()
        .uri(format!("/api/v1/projects/{}", fx.project))
        .header("x-api-key", READ_KEY)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["access"], "api_key");
}

#[tokio::test]
async fn test_policy_summary() {
    let (app, _) = setup();

    let response = send(&app, Method::GET, "/api/v1/policy", Some(VIEWER), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["roles"][0]["name"], "viewer");
    assert_eq!(json["roles"][2]["level"], 3);
}

// ============================================================================
// Project id in the route
// ============================================================================

#[tokio::test]
async fn test_project_members_pass_viewer_guard() {
    let (app, fx) = setup();
    let uri = format!("/api/v1/projects/{}", fx.project);

    for token in [VIEWER, EDITOR, ADMIN, READ_KEY] {
        let response = send(&app, Method::GET, &uri, Some(token), None).await;
        assert_eq!(response.status(), StatusCode::OK, "token {token}");
    }

    let json = body_json(send(&app, Method::GET, &uri, Some(EDITOR), None).await).await;
    assert_eq!(json["project_id"], fx.project.to_string());
    assert_eq!(json["access"], "user");
}

#[tokio::test]
async fn test_non_member_gets_project_not_found() {
    let (app, fx) = setup();

    let response = send(&app, Method::GET, &format!("/api/v1/projects/{}", fx.project), Some(OUTSIDER), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "project not found");
}

#[tokio::test]
async fn test_api_key_bound_to_other_project_is_forbidden() {
    let (app, fx) = setup();

    let response = send(&app, Method::GET, &format!("/api/v1/projects/{}", fx.project), Some(FOREIGN_KEY), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let json = body_json(response).await;
    assert_eq!(json["error"], "forbidden");
    assert_eq!(json["status"], 403);

    let own = send(&app, Method::GET, &format!("/api/v1/projects/{}", fx.other_project), Some(FOREIGN_KEY), None).await;
    assert_eq!(own.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_malformed_project_id_is_bad_request() {
    let (app, _) = setup();

    let response = send(&app, Method::GET, "/api/v1/projects/not-a-uuid", Some(ADMIN), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Capability check
// ============================================================================

#[tokio::test]
async fn test_only_admins_create_api_keys() {
    let (app, fx) = setup();
    let uri = format!("/api/v1/projects/{}/api-keys", fx.project);
    let body = r#"{"permissions": ["read", "write"], "name": "ci"}"#;

    for token in [VIEWER, EDITOR, FULL_KEY] {
        let response = send(&app, Method::POST, &uri, Some(token), Some(body)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "token {token}");
    }

    let response = send(&app, Method::POST, &uri, Some(ADMIN), Some(body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    let token = json["token"].as_str().unwrap().to_string();
    assert!(token.starts_with("shelf_"));
    assert_eq!(json["project_id"], fx.project.to_string());
    assert_eq!(json["permissions"], serde_json::json!(["read", "write"]));

    // The minted key works right away and is bound to the project
    let read = send(&app, Method::GET, &format!("/api/v1/files/{}", fx.file.id), Some(&token), None).await;
    assert_eq!(read.status(), StatusCode::OK);
    let delete = send(&app, Method::DELETE, &format!("/api/v1/files/{}", fx.file.id), Some(&token), None).await;
    assert_eq!(delete.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_api_key_permissions_are_validated() {
    let (app, fx) = setup();
    let uri = format!("/api/v1/projects/{}/api-keys", fx.project);

    for body in [r#"{"permissions": []}"#, r#"{"permissions": ["read", "admin"]}"#] {
        let response = send(&app, Method::POST, &uri, Some(ADMIN), Some(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");

        let json = body_json(response).await;
        assert_eq!(json["error"], "invalid permissions");
        assert!(!json.to_string().contains("admin"));
    }
    assert_eq!(fx.store.credential_count(), 7);
}

// ============================================================================
// Resource id only in the route
// ============================================================================

#[tokio::test]
async fn test_file_access_follows_role_levels() {
    let (app, fx) = setup();
    let uri = format!("/api/v1/files/{}", fx.file.id);
    let rename = r#"{"name": "plan-v2.md"}"#;

    let response = send(&app, Method::GET, &uri, Some(VIEWER), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "plan.md");

    let response = send(&app, Method::PUT, &uri, Some(VIEWER), Some(rename)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&app, Method::PUT, &uri, Some(EDITOR), Some(rename)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "plan-v2.md");

    let response = send(&app, Method::DELETE, &uri, Some(EDITOR), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&app, Method::DELETE, &uri, Some(ADMIN), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(fx.store.resource_count(), 1);

    let response = send(&app, Method::GET, &uri, Some(ADMIN), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_api_key_file_access_uses_permissions() {
    let (app, fx) = setup();
    let uri = format!("/api/v1/files/{}", fx.file.id);

    let response = send(&app, Method::GET, &uri, Some(READ_KEY), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, Method::PUT, &uri, Some(READ_KEY), Some(r#"{"name": "x"}"#)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&app, Method::PUT, &uri, Some(FULL_KEY), Some(r#"{"name": "x"}"#)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cross_project_file_is_indistinguishable_from_missing() {
    let (app, fx) = setup();
    let cross_uri = format!("/api/v1/files/{}", fx.foreign_file.id);
    let missing_uri = format!("/api/v1/files/{}", Uuid::new_v4());

    for token in [FULL_KEY, ADMIN] {
        let cross = send(&app, Method::GET, &cross_uri, Some(token), None).await;
        let missing = send(&app, Method::GET, &missing_uri, Some(token), None).await;

        assert_eq!(cross.status(), StatusCode::NOT_FOUND);
        assert_eq!(cross.status(), missing.status());

        let cross_body = to_bytes(cross.into_body(), usize::MAX).await.unwrap();
        let missing_body = to_bytes(missing.into_body(), usize::MAX).await.unwrap();
        assert_eq!(cross_body, missing_body, "token {token}");
    }

    // Nothing was changed through the foreign path
    let response = send(&app, Method::DELETE, &cross_uri, Some(FULL_KEY), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(fx.store.resource_count(), 2);
}

#[tokio::test]
async fn test_malformed_file_id_is_bad_request() {
    let (app, _) = setup();

    let response = send(&app, Method::GET, "/api/v1/files/12345", Some(VIEWER), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_request_id_is_returned() {
    let (app, _) = setup();

    let response = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}
