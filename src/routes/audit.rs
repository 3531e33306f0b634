use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Role;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::audit::{AuditLogEntry, DbAuditLogEntry};
use crate::utils::utc_now;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

const AUDIT_COLUMNS: &str = "id, actor_id, action, resource_type, resource_id, details, ip_address, user_agent, severity, created_at";

#[derive(Debug, Deserialize)]
pub struct AuditListQuery {
    pub actor_id: Option<Uuid>,
    pub resource_type: Option<String>,
    pub resource_id: Option<Uuid>,
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/audit",
    tag = "Audit",
    responses(
        (status = 200, description = "Audit trail, newest first", body = [AuditLogEntry]),
        (status = 403, description = "Admin only")
    )
)]
pub async fn list_audit_log(
    State(state): State<AppState>,
    Query(query): Query<AuditListQuery>,
    auth: AuthUser,
) -> AppResult<Json<Vec<AuditLogEntry>>> {
    ensure_admin(&auth)?;

    let mut sql = format!("SELECT {AUDIT_COLUMNS} FROM audit_log WHERE 1=1");
    if query.actor_id.is_some() {
        sql.push_str(" AND actor_id = ?");
    }
    if query.resource_type.is_some() {
        sql.push_str(" AND resource_type = ?");
    }
    if query.resource_id.is_some() {
        sql.push_str(" AND resource_id = ?");
    }
    sql.push_str(" ORDER BY created_at DESC LIMIT ?");

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let mut q = sqlx::query_as::<_, DbAuditLogEntry>(&sql);
    if let Some(actor_id) = query.actor_id {
        q = q.bind(actor_id);
    }
    if let Some(ref resource_type) = query.resource_type {
        q = q.bind(resource_type);
    }
    if let Some(resource_id) = query.resource_id {
        q = q.bind(resource_id);
    }
    q = q.bind(limit);

    let rows = q.fetch_all(&state.pool).await?;
    let entries: Vec<AuditLogEntry> = rows
        .into_iter()
        .map(AuditLogEntry::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(entries))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActionCount {
    pub action: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SeverityCount {
    pub severity: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SecurityStats {
    pub total_entries: i64,
    pub by_action: Vec<ActionCount>,
    pub by_severity: Vec<SeverityCount>,
    pub failed_logins_24h: i64,
}

#[utoipa::path(
    get,
    path = "/audit/stats",
    tag = "Audit",
    responses(
        (status = 200, description = "Security statistics over the audit trail", body = SecurityStats),
        (status = 403, description = "Admin only")
    )
)]
pub async fn security_stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<SecurityStats>> {
    ensure_admin(&auth)?;

    let total_entries: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM audit_log")
        .fetch_one(&state.pool)
        .await?;

    let by_action: Vec<(String, i64)> = sqlx::query_as(
        "SELECT action, COUNT(1) FROM audit_log GROUP BY action ORDER BY COUNT(1) DESC LIMIT 10",
    )
    .fetch_all(&state.pool)
    .await?;

    let by_severity: Vec<(String, i64)> =
        sqlx::query_as("SELECT severity, COUNT(1) FROM audit_log GROUP BY severity")
            .fetch_all(&state.pool)
            .await?;

    let day_ago = utc_now() - chrono::Duration::hours(24);
    let failed_logins_24h: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM audit_log WHERE action = 'user.login_failed' AND created_at >= ?",
    )
    .bind(day_ago)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(SecurityStats {
        total_entries,
        by_action: by_action
            .into_iter()
            .map(|(action, count)| ActionCount { action, count })
            .collect(),
        by_severity: by_severity
            .into_iter()
            .map(|(severity, count)| SeverityCount { severity, count })
            .collect(),
        failed_logins_24h,
    }))
}

fn ensure_admin(auth: &AuthUser) -> AppResult<()> {
    if auth.role != Role::Admin {
        return Err(AppError::forbidden("admin only"));
    }
    Ok(())
}
