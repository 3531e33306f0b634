use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::lifecycle::TicketStatus;
use crate::models::ticket::Ticket;

/// User roles, least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Employee,
    Agent,
    Supervisor,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Employee, Role::Agent, Role::Supervisor, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Agent => "agent",
            Role::Supervisor => "supervisor",
            Role::Admin => "admin",
        }
    }

    /// Agent-class roles staff the helpdesk; employees are requesters.
    pub fn is_agent_class(&self) -> bool {
        matches!(self, Role::Agent | Role::Supervisor | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "employee" => Ok(Role::Employee),
            "agent" => Ok(Role::Agent),
            "supervisor" => Ok(Role::Supervisor),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// The authenticated identity attempting an action.
///
/// Inactive accounts are rejected by the auth extractor before any handler
/// runs, so an `Actor` is always an active user.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}

/// The slice of ticket state the policy evaluator decides against, plus the
/// owning user of a child resource for ownership actions (delete comment,
/// delete attachment).
#[derive(Debug, Clone)]
pub struct TicketContext {
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub status: TicketStatus,
    pub resource_owner: Option<Uuid>,
}

impl TicketContext {
    pub fn for_ticket(ticket: &Ticket) -> Self {
        Self {
            created_by: ticket.created_by,
            assigned_to: ticket.assigned_to,
            status: ticket.status,
            resource_owner: None,
        }
    }

    /// Attach the author/uploader of the comment or attachment being acted on.
    pub fn with_owner(mut self, owner: Uuid) -> Self {
        self.resource_owner = Some(owner);
        self
    }

    pub fn is_creator(&self, actor: &Actor) -> bool {
        self.created_by == actor.id
    }

    pub fn is_assignee(&self, actor: &Actor) -> bool {
        self.assigned_to == Some(actor.id)
    }

    pub fn is_unassigned(&self) -> bool {
        self.assigned_to.is_none()
    }

    pub fn is_resource_owner(&self, actor: &Actor) -> bool {
        self.resource_owner == Some(actor.id)
    }
}
