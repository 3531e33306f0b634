#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt; // for `oneshot`
use uuid::Uuid;

use helpdesk::authz::Role;
use helpdesk::create_app;
use helpdesk::jwt::JwtConfig;

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    _dir: TempDir,
}

/// Fresh SQLite database + migrations + app (pattern shared by every
/// integration test).
pub async fn setup() -> Result<TestApp> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    // Shared across the test process; stored names are unique per upload.
    std::env::set_var(
        "UPLOAD_DIR",
        std::env::temp_dir().join("helpdesk-test-uploads"),
    );

    let app = create_app(pool.clone()).await?;

    Ok(TestApp {
        app,
        pool,
        _dir: dir,
    })
}

/// Insert a user directly and mint a token for them, bypassing the register
/// endpoint (which only creates employees).
pub async fn seed_user(pool: &SqlitePool, role: Role, email: &str) -> Result<(Uuid, String)> {
    let id = Uuid::new_v4();
    let now = chrono::Utc::now();

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(email.split('@').next().unwrap_or("user"))
    .bind(email)
    .bind("not-a-real-hash")
    .bind(role)
    .bind(true)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    let token = JwtConfig::from_env()?.encode(id)?;
    Ok((id, token))
}

/// Register an employee through the API and return (user id, token).
pub async fn register_employee(app: &Router, name: &str, email: &str) -> Result<(Uuid, String)> {
    let (status, body) = request_json(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "name": name, "email": email, "password": "password123" })),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "register failed: {body}");

    let token = body
        .get("token")
        .and_then(|v| v.as_str())
        .context("missing token")?
        .to_string();
    let id = body
        .pointer("/user/id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .context("missing user id")?;

    Ok((id, token))
}

/// Fire a JSON request through the router and parse the response body.
pub async fn request_json(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    payload: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }

    let req = match payload {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let resp: Response = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    Ok((status, value))
}

/// Create a ticket as the given caller and return its id.
pub async fn create_ticket(app: &Router, token: &str, subject: &str) -> Result<Uuid> {
    let (status, body) = request_json(
        app,
        "POST",
        "/tickets",
        Some(token),
        Some(json!({ "subject": subject, "description": "integration test ticket" })),
    )
    .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "create ticket failed: {body}");

    body.get("id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .context("missing ticket id")
}

/// Minimal multipart/form-data body with a single file field.
pub fn multipart_body(boundary: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
