use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::audit::AuditRecorder;
use crate::authz::{DefaultPolicyEvaluator, PolicyEvaluator};
use crate::errors::AppError;
use crate::files::{LocalFileStore, ObjectStore};
use crate::jwt::JwtConfig;
use crate::routes::{attachments, audit, auth, comments, health, tickets};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub policy: Arc<dyn PolicyEvaluator>,
    pub audit: AuditRecorder,
    pub files: Arc<dyn ObjectStore>,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        jwt: JwtConfig,
        policy: Arc<dyn PolicyEvaluator>,
        audit: AuditRecorder,
        files: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            policy,
            audit,
            files,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let audit_recorder = AuditRecorder::start(pool.clone());
    let state = AppState::new(
        pool,
        jwt_config,
        Arc::new(DefaultPolicyEvaluator::new()),
        audit_recorder,
        Arc::new(LocalFileStore::from_env()),
    );

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let ticket_routes = Router::new()
        .route("/", get(tickets::list_tickets))
        .route("/", post(tickets::create_ticket))
        .route("/:id", get(tickets::get_ticket))
        .route("/:id", put(tickets::update_ticket))
        .route("/:id/assign", post(tickets::assign_ticket));

    // Comments and attachments are scoped to a ticket: /tickets/:ticket_id/...
    let comment_routes = Router::new()
        .route("/", get(comments::list_comments))
        .route("/", post(comments::create_comment))
        .route("/:id", put(comments::update_comment))
        .route("/:id", delete(comments::delete_comment));

    let attachment_routes = Router::new()
        .route("/", get(attachments::list_attachments))
        .route("/", post(attachments::upload_attachment))
        .route("/:id", get(attachments::download_attachment))
        .route("/:id", delete(attachments::delete_attachment));

    let audit_routes = Router::new()
        .route("/", get(audit::list_audit_log))
        .route("/stats", get(audit::security_stats));

    let router = Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/tickets", ticket_routes)
        .nest("/tickets/:ticket_id/comments", comment_routes)
        .nest("/tickets/:ticket_id/attachments", attachment_routes)
        .nest("/audit", audit_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
