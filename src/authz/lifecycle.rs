use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::actor::Role;
use crate::models::ticket::Ticket;

/// Ticket statuses. `Open` is initial, `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Assigned,
    InProgress,
    PendingUser,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 6] = [
        TicketStatus::Open,
        TicketStatus::Assigned,
        TicketStatus::InProgress,
        TicketStatus::PendingUser,
        TicketStatus::Resolved,
        TicketStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Assigned => "assigned",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::PendingUser => "pending_user",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Closed)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a requested transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("ticket is closed")]
    Terminal,
    #[error("role `{role}` may not request status `{requested}`")]
    RoleCannotRequest { role: Role, requested: TicketStatus },
}

/// Role-class gate over requested statuses, the transition table as data.
///
/// Employees may only ever kick a ticket back to themselves
/// (`pending_user`); agent-class roles may request any status. Whether this
/// particular actor may touch this particular ticket is the policy
/// evaluator's decision, not the state machine's.
pub fn role_may_request(role: Role, requested: TicketStatus) -> bool {
    match role {
        Role::Employee => matches!(requested, TicketStatus::PendingUser),
        Role::Agent | Role::Supervisor | Role::Admin => true,
    }
}

/// Apply a status transition, returning the updated ticket.
///
/// Pure: the caller supplies `now` and persists the result. Side effects on
/// the returned value: first entry into `resolved` stamps `resolved_at`,
/// first entry into `closed` stamps `closed_at`; re-entering a status the
/// ticket already reached is idempotent and overwrites nothing.
pub fn transition(
    ticket: &Ticket,
    requested: TicketStatus,
    role: Role,
    now: DateTime<Utc>,
) -> Result<Ticket, TransitionError> {
    if ticket.status.is_terminal() {
        return Err(TransitionError::Terminal);
    }

    if !role_may_request(role, requested) {
        return Err(TransitionError::RoleCannotRequest { role, requested });
    }

    let mut updated = ticket.clone();
    updated.status = requested;
    updated.updated_at = now;

    match requested {
        TicketStatus::Resolved => {
            updated.resolved_at = updated.resolved_at.or(Some(now));
        }
        TicketStatus::Closed => {
            updated.closed_at = updated.closed_at.or(Some(now));
        }
        _ => {}
    }

    Ok(updated)
}
