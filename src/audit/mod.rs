//! Audit trail recorder.
//!
//! Best-effort observability: every committed mutation is reported here, but
//! the business state never depends on the audit sink. `record` pushes onto a
//! bounded queue and returns immediately; a single listener task drains the
//! queue in FIFO order (so entries for any one ticket land in record order)
//! and persists hash-chained rows. Any failure — full queue, closed channel,
//! insert error — falls back to the `tracing` sink and is never surfaced to
//! the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use uuid::Uuid;

mod auditable;
pub use auditable::{Auditable, Severity};

/// Queue depth; beyond this, entries spill to the secondary log sink.
const AUDIT_QUEUE_DEPTH: usize = 1024;

/// Request context captured for the audit trail (IP, User-Agent).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Extract context from request headers, preferring the first
    /// x-forwarded-for hop.
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            });

        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self { ip, user_agent }
    }
}

/// One committed action on its way to the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    pub details: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<RequestContext>,
    pub severity: Severity,
    pub recorded_at: DateTime<Utc>,
}

/// Fire-and-forget handle handed to every route handler.
#[derive(Clone)]
pub struct AuditRecorder {
    tx: mpsc::Sender<AuditEvent>,
}

impl AuditRecorder {
    /// Build a recorder and spawn its listener against the given pool.
    pub fn start(pool: SqlitePool) -> Self {
        let (tx, rx) = mpsc::channel(AUDIT_QUEUE_DEPTH);
        tokio::spawn(run_listener(rx, pool));
        Self { tx }
    }

    /// Record a committed action. Never errors and never blocks: if the
    /// queue is full or the listener is gone, the entry goes to the
    /// secondary sink instead.
    pub fn record(
        &self,
        actor_id: Option<Uuid>,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: Option<Uuid>,
        details: Value,
        context: Option<RequestContext>,
    ) {
        self.push(AuditEvent {
            id: Uuid::new_v4(),
            actor_id,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id,
            details,
            context,
            severity: Severity::Important,
            recorded_at: Utc::now(),
        });
    }

    /// Record an action on an [`Auditable`] entity, with optional previous
    /// state for update/delete operations. Action names come out as
    /// "ticket.updated" style.
    pub fn record_entity<T: Auditable>(
        &self,
        actor_id: Option<Uuid>,
        action: &str,
        entity: &T,
        old_entity: Option<&T>,
        context: Option<RequestContext>,
    ) {
        let details = serde_json::json!({
            "new": serde_json::to_value(entity).unwrap_or_default(),
            "old": old_entity.map(|e| serde_json::to_value(e).unwrap_or_default()),
        });

        self.push(AuditEvent {
            id: Uuid::new_v4(),
            actor_id,
            action: format!("{}.{}", T::entity_type(), action),
            resource_type: T::entity_type().to_string(),
            resource_id: Some(entity.subject_id()),
            details,
            context,
            severity: entity.severity_for_action(action),
            recorded_at: Utc::now(),
        });
    }

    fn push(&self, event: AuditEvent) {
        if let Err(err) = self.tx.try_send(event) {
            // Secondary sink: the entry is still reconstructable from logs.
            let event = match &err {
                mpsc::error::TrySendError::Full(e) => e,
                mpsc::error::TrySendError::Closed(e) => e,
            };
            tracing::warn!(
                target: "audit",
                action = %event.action,
                payload = %serde_json::to_string(event).unwrap_or_default(),
                "audit queue unavailable, entry spilled to log sink"
            );
        }
    }
}

/// Single consumer: drains the queue in FIFO order and appends hash-chained
/// rows. Insert failures go to the secondary sink; they never propagate.
async fn run_listener(mut rx: mpsc::Receiver<AuditEvent>, pool: SqlitePool) {
    tracing::info!("audit listener started");

    while let Some(event) = rx.recv().await {
        let details = serde_json::to_string(&event.details).unwrap_or_default();
        let payload = serde_json::to_string(&event).unwrap_or_default();

        let prev_hash: Option<String> =
            sqlx::query_scalar("SELECT hash FROM audit_log ORDER BY rowid DESC LIMIT 1")
                .fetch_optional(&pool)
                .await
                .ok()
                .flatten();

        let mut hasher = Sha256::new();
        if let Some(ref ph) = prev_hash {
            hasher.update(ph.as_bytes());
        }
        hasher.update(payload.as_bytes());
        let hash = hex::encode(hasher.finalize());

        let (ip, user_agent) = match &event.context {
            Some(ctx) => (ctx.ip.clone(), ctx.user_agent.clone()),
            None => (None, None),
        };

        let result = sqlx::query(
            "INSERT INTO audit_log (id, actor_id, action, resource_type, resource_id, details, ip_address, user_agent, severity, prev_hash, hash, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(event.id)
        .bind(event.actor_id)
        .bind(&event.action)
        .bind(&event.resource_type)
        .bind(event.resource_id)
        .bind(&details)
        .bind(&ip)
        .bind(&user_agent)
        .bind(event.severity.as_str())
        .bind(&prev_hash)
        .bind(&hash)
        .bind(event.recorded_at)
        .execute(&pool)
        .await;

        if let Err(e) = result {
            tracing::error!(
                target: "audit",
                action = %event.action,
                payload = %payload,
                "failed to persist audit entry: {e}"
            );
        }
    }
}
