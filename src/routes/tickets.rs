use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::audit::RequestContext;
use crate::authz::{self, Role, TicketAction, TicketContext, TicketStatus};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::ticket::{
    DbTicket, Ticket, TicketAssignRequest, TicketCreateRequest, TicketPriority,
    TicketUpdateRequest,
};
use crate::utils::utc_now;

const TICKET_COLUMNS: &str = "id, created_by, assigned_to, status, priority, category, subject, description, resolved_at, closed_at, created_at, updated_at";

#[derive(Debug, Deserialize)]
pub struct TicketListQuery {
    pub status: Option<TicketStatus>,
}

#[utoipa::path(
    get,
    path = "/tickets",
    tag = "Tickets",
    responses((status = 200, description = "List tickets visible to the caller", body = [Ticket]))
)]
pub async fn list_tickets(
    State(state): State<AppState>,
    Query(query): Query<TicketListQuery>,
    auth: AuthUser,
) -> AppResult<Json<Vec<Ticket>>> {
    // The list is pre-scoped by the same relationships the evaluator uses
    // for single-ticket view: employees see their own tickets, agents see
    // their queue plus the unclaimed pool, supervisors and admins see all.
    let base = match auth.role {
        Role::Employee => format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE created_by = ?"
        ),
        Role::Agent => format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE (assigned_to = ? OR assigned_to IS NULL)"
        ),
        Role::Supervisor | Role::Admin => {
            format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE 1=1")
        }
    };

    let mut sql = base;
    if query.status.is_some() {
        sql.push_str(" AND status = ?");
    }
    sql.push_str(" ORDER BY created_at DESC");

    let mut q = sqlx::query_as::<_, DbTicket>(&sql);
    if matches!(auth.role, Role::Employee | Role::Agent) {
        q = q.bind(auth.user_id);
    }
    if let Some(status) = query.status {
        q = q.bind(status);
    }

    let rows = q.fetch_all(&state.pool).await?;
    let tickets: Vec<Ticket> = rows
        .into_iter()
        .map(Ticket::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(tickets))
}

#[utoipa::path(
    post,
    path = "/tickets",
    tag = "Tickets",
    request_body = TicketCreateRequest,
    responses((status = 201, description = "Ticket created", body = Ticket))
)]
pub async fn create_ticket(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: axum::http::HeaderMap,
    Json(payload): Json<TicketCreateRequest>,
) -> AppResult<(StatusCode, Json<Ticket>)> {
    if payload.subject.trim().is_empty() {
        return Err(AppError::bad_request("subject must not be empty"));
    }

    let ticket_id = Uuid::new_v4();
    let now = utc_now();
    let priority = payload.priority.unwrap_or(TicketPriority::Medium);
    let category = payload.category.unwrap_or_else(|| "general".to_string());

    sqlx::query(
        "INSERT INTO tickets (id, created_by, assigned_to, status, priority, category, subject, description, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(ticket_id)
    .bind(auth.user_id)
    .bind(Option::<Uuid>::None)
    .bind(TicketStatus::Open)
    .bind(priority)
    .bind(&category)
    .bind(&payload.subject)
    .bind(&payload.description)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let ticket: Ticket = fetch_ticket(&state.pool, ticket_id).await?.try_into()?;

    let ctx = RequestContext::from_headers(&headers);
    state
        .audit
        .record_entity(Some(auth.user_id), "created", &ticket, None, Some(ctx));

    Ok((StatusCode::CREATED, Json(ticket)))
}

#[utoipa::path(
    get,
    path = "/tickets/{id}",
    tag = "Tickets",
    params(("id" = Uuid, Path, description = "Ticket id")),
    responses((status = 200, description = "Ticket detail", body = Ticket))
)]
pub async fn get_ticket(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Ticket>> {
    let ticket: Ticket = fetch_ticket(&state.pool, id).await?.try_into()?;

    let ctx = TicketContext::for_ticket(&ticket);
    if !state.policy.can(&auth.actor(), TicketAction::View, &ctx) {
        return Err(AppError::forbidden("not allowed to view this ticket"));
    }

    Ok(Json(ticket))
}

#[utoipa::path(
    put,
    path = "/tickets/{id}",
    tag = "Tickets",
    params(("id" = Uuid, Path, description = "Ticket id")),
    request_body = TicketUpdateRequest,
    responses(
        (status = 200, description = "Ticket updated", body = Ticket),
        (status = 409, description = "Concurrent update lost the race"),
        (status = 422, description = "Requested status not reachable")
    )
)]
pub async fn update_ticket(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: axum::http::HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<TicketUpdateRequest>,
) -> AppResult<Json<Ticket>> {
    // Old state captured before modification, both for the audit entry and
    // for the conditional write below.
    let old: Ticket = fetch_ticket(&state.pool, id).await?.try_into()?;

    let ctx = TicketContext::for_ticket(&old);
    if !state.policy.can(&auth.actor(), TicketAction::Modify, &ctx) {
        return Err(AppError::forbidden("not allowed to modify this ticket"));
    }

    let now = utc_now();

    // Status changes run through the state machine; authorization and
    // lifecycle are both decided before anything is written.
    let mut ticket = match payload.status {
        Some(requested) => authz::transition(&old, requested, auth.role, now)?,
        None => {
            let mut t = old.clone();
            t.updated_at = now;
            t
        }
    };

    if let Some(subject) = payload.subject {
        if subject.trim().is_empty() {
            return Err(AppError::bad_request("subject must not be empty"));
        }
        ticket.subject = subject;
    }
    if let Some(description) = payload.description {
        ticket.description = description;
    }
    if let Some(category) = payload.category {
        ticket.category = category;
    }
    if let Some(priority) = payload.priority {
        ticket.priority = priority;
    }

    // Conditional on the status observed at read time so a concurrent
    // transition surfaces as a conflict instead of being overwritten.
    let affected = sqlx::query(
        "UPDATE tickets SET subject = ?, description = ?, category = ?, priority = ?, status = ?, resolved_at = ?, closed_at = ?, updated_at = ? \
         WHERE id = ? AND status = ?",
    )
    .bind(&ticket.subject)
    .bind(&ticket.description)
    .bind(&ticket.category)
    .bind(ticket.priority)
    .bind(ticket.status)
    .bind(ticket.resolved_at)
    .bind(ticket.closed_at)
    .bind(ticket.updated_at)
    .bind(ticket.id)
    .bind(old.status)
    .execute(&state.pool)
    .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::conflict("ticket changed concurrently, re-fetch and retry"));
    }

    let ticket: Ticket = fetch_ticket(&state.pool, id).await?.try_into()?;

    let ctx = RequestContext::from_headers(&headers);
    state
        .audit
        .record_entity(Some(auth.user_id), "updated", &ticket, Some(&old), Some(ctx));

    Ok(Json(ticket))
}

#[utoipa::path(
    post,
    path = "/tickets/{id}/assign",
    tag = "Tickets",
    params(("id" = Uuid, Path, description = "Ticket id")),
    request_body = TicketAssignRequest,
    responses(
        (status = 200, description = "Ticket assigned", body = Ticket),
        (status = 409, description = "Another claim won the race")
    )
)]
pub async fn assign_ticket(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: axum::http::HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<TicketAssignRequest>,
) -> AppResult<Json<Ticket>> {
    let old: Ticket = fetch_ticket(&state.pool, id).await?.try_into()?;

    let ctx = TicketContext::for_ticket(&old);
    if !state.policy.can(&auth.actor(), TicketAction::Assign, &ctx) {
        return Err(AppError::forbidden("not allowed to assign tickets"));
    }

    if old.status.is_terminal() {
        return Err(AppError::InvalidTransition("ticket is closed".to_string()));
    }

    // Omitted assignee means the caller claims the ticket for themselves.
    let assignee = payload.assignee_id.unwrap_or(auth.user_id);
    ensure_assignable(&state.pool, assignee).await?;

    let now = utc_now();
    // A claim moves an open ticket into the assigned status; reassignment
    // of a ticket already in flight keeps its current status.
    let new_status = if old.status == TicketStatus::Open {
        TicketStatus::Assigned
    } else {
        old.status
    };

    // Single conditional write on the assignee observed at read time.
    // `IS ?` matches NULL for a claim of an unassigned ticket.
    let affected = sqlx::query(
        "UPDATE tickets SET assigned_to = ?, status = ?, updated_at = ? WHERE id = ? AND assigned_to IS ?",
    )
    .bind(assignee)
    .bind(new_status)
    .bind(now)
    .bind(id)
    .bind(old.assigned_to)
    .execute(&state.pool)
    .await?;

    if affected.rows_affected() == 0 {
        // Lost the race: re-evaluate against the now-updated record rather
        // than the stale copy before reporting.
        let current: Ticket = fetch_ticket(&state.pool, id).await?.try_into()?;
        let ctx = TicketContext::for_ticket(&current);
        if !state.policy.can(&auth.actor(), TicketAction::Assign, &ctx) {
            return Err(AppError::forbidden("not allowed to assign tickets"));
        }
        return Err(AppError::conflict("ticket was claimed concurrently"));
    }

    let ticket: Ticket = fetch_ticket(&state.pool, id).await?.try_into()?;

    let ctx = RequestContext::from_headers(&headers);
    state
        .audit
        .record_entity(Some(auth.user_id), "assigned", &ticket, Some(&old), Some(ctx));

    Ok(Json(ticket))
}

/// Assignees must be active agent-class accounts.
async fn ensure_assignable(pool: &SqlitePool, user_id: Uuid) -> AppResult<()> {
    let row: Option<(Role, bool)> = sqlx::query_as("SELECT role, active FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    match row {
        None => Err(AppError::not_found("assignee not found")),
        Some((role, _)) if !role.is_agent_class() => {
            Err(AppError::bad_request("assignee must be an agent, supervisor or admin"))
        }
        Some((_, false)) => Err(AppError::bad_request("assignee account is disabled")),
        Some(_) => Ok(()),
    }
}

pub(crate) async fn fetch_ticket(pool: &SqlitePool, ticket_id: Uuid) -> AppResult<DbTicket> {
    let sql = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?");
    let ticket = sqlx::query_as::<_, DbTicket>(&sql)
        .bind(ticket_id)
        .fetch_optional(pool)
        .await?;

    ticket.ok_or_else(|| AppError::not_found("ticket not found"))
}
