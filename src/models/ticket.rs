use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::TicketStatus;
use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Urgent => "urgent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Ticket {
    pub id: Uuid,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    #[schema(example = "hardware")]
    pub category: String,
    #[schema(example = "Laptop will not boot")]
    pub subject: String,
    pub description: String,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl crate::audit::Auditable for Ticket {
    fn entity_type() -> &'static str { "ticket" }
    fn subject_id(&self) -> Uuid { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbTicket {
    pub id: Uuid,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub category: String,
    pub subject: String,
    pub description: String,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbTicket> for Ticket {
    type Error = AppError;

    fn try_from(value: DbTicket) -> Result<Self, Self::Error> {
        Ok(Ticket {
            id: value.id,
            created_by: value.created_by,
            assigned_to: value.assigned_to,
            status: value.status,
            priority: value.priority,
            category: value.category,
            subject: value.subject,
            description: value.description,
            resolved_at: value.resolved_at,
            closed_at: value.closed_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TicketCreateRequest {
    #[schema(example = "Laptop will not boot")]
    pub subject: String,
    #[schema(example = "Black screen since this morning, fan spins up briefly.")]
    pub description: String,
    #[schema(example = "hardware")]
    pub category: Option<String>,
    pub priority: Option<TicketPriority>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TicketUpdateRequest {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<TicketPriority>,
    /// Requested status; runs through the lifecycle state machine.
    pub status: Option<TicketStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TicketAssignRequest {
    /// Target assignee. Omitted means the caller claims the ticket.
    pub assignee_id: Option<Uuid>,
}
