use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

/// Append-only audit trail entry as served by the admin query endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    #[schema(example = "ticket.updated")]
    pub action: String,
    #[schema(example = "ticket")]
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    #[schema(value_type = Object)]
    pub details: Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub severity: String,
    pub created_at: DateTime<Utc>,
}

/// Row shape; `details` is stored as serialized JSON text, `hash`/`prev_hash`
/// are the chain columns and stay out of the API type.
#[derive(Debug, Clone, FromRow)]
pub struct DbAuditLogEntry {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    pub details: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub severity: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbAuditLogEntry> for AuditLogEntry {
    type Error = AppError;

    fn try_from(value: DbAuditLogEntry) -> Result<Self, Self::Error> {
        let details = serde_json::from_str(&value.details).unwrap_or(Value::Null);
        Ok(AuditLogEntry {
            id: value.id,
            actor_id: value.actor_id,
            action: value.action,
            resource_type: value.resource_type,
            resource_id: value.resource_id,
            details,
            ip_address: value.ip_address,
            user_agent: value.user_agent,
            severity: value.severity,
            created_at: value.created_at,
        })
    }
}
