use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::audit::RequestContext;
use crate::authz::{can_author_internal, filter_comments, TicketAction, TicketContext};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::comment::{Comment, CommentCreateRequest, CommentUpdateRequest, DbComment};
use crate::models::ticket::Ticket;
use crate::routes::tickets::fetch_ticket;
use crate::utils::utc_now;

const COMMENT_COLUMNS: &str =
    "id, ticket_id, author_id, author_role, content, is_internal, edited_at, created_at";

#[utoipa::path(
    get,
    path = "/tickets/{ticket_id}/comments",
    tag = "Comments",
    params(("ticket_id" = Uuid, Path, description = "Ticket id")),
    responses((status = 200, description = "Comment thread, internal notes filtered per role", body = [Comment]))
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    auth: AuthUser,
) -> AppResult<Json<Vec<Comment>>> {
    let ticket: Ticket = fetch_ticket(&state.pool, ticket_id).await?.try_into()?;

    let ctx = TicketContext::for_ticket(&ticket);
    if !state.policy.can(&auth.actor(), TicketAction::View, &ctx) {
        return Err(AppError::forbidden("not allowed to view this ticket"));
    }

    let sql = format!(
        "SELECT {COMMENT_COLUMNS} FROM comments WHERE ticket_id = ? ORDER BY created_at ASC"
    );
    let rows = sqlx::query_as::<_, DbComment>(&sql)
        .bind(ticket_id)
        .fetch_all(&state.pool)
        .await?;

    let comments: Vec<Comment> = rows
        .into_iter()
        .map(Comment::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(filter_comments(comments, auth.role)))
}

#[utoipa::path(
    post,
    path = "/tickets/{ticket_id}/comments",
    tag = "Comments",
    params(("ticket_id" = Uuid, Path, description = "Ticket id")),
    request_body = CommentCreateRequest,
    responses((status = 201, description = "Comment created", body = Comment))
)]
pub async fn create_comment(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    auth: AuthUser,
    headers: axum::http::HeaderMap,
    Json(payload): Json<CommentCreateRequest>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let ticket: Ticket = fetch_ticket(&state.pool, ticket_id).await?.try_into()?;

    let ctx = TicketContext::for_ticket(&ticket);
    if !state.policy.can(&auth.actor(), TicketAction::Comment, &ctx) {
        return Err(AppError::forbidden("not allowed to comment on this ticket"));
    }

    // Independent gate on top of the comment permission.
    if payload.internal && !can_author_internal(auth.role) {
        return Err(AppError::forbidden("internal notes require an agent role"));
    }

    if payload.content.trim().is_empty() {
        return Err(AppError::bad_request("comment must not be empty"));
    }

    let comment_id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO comments (id, ticket_id, author_id, author_role, content, is_internal, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(comment_id)
    .bind(ticket_id)
    .bind(auth.user_id)
    .bind(auth.role)
    .bind(&payload.content)
    .bind(payload.internal)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let comment: Comment = fetch_comment(&state.pool, ticket_id, comment_id).await?.try_into()?;

    let ctx = RequestContext::from_headers(&headers);
    state
        .audit
        .record_entity(Some(auth.user_id), "created", &comment, None, Some(ctx));

    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    put,
    path = "/tickets/{ticket_id}/comments/{id}",
    tag = "Comments",
    params(
        ("ticket_id" = Uuid, Path, description = "Ticket id"),
        ("id" = Uuid, Path, description = "Comment id")
    ),
    request_body = CommentUpdateRequest,
    responses((status = 200, description = "Comment updated", body = Comment))
)]
pub async fn update_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: axum::http::HeaderMap,
    Path((ticket_id, id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CommentUpdateRequest>,
) -> AppResult<Json<Comment>> {
    let _ticket: Ticket = fetch_ticket(&state.pool, ticket_id).await?.try_into()?;
    let old: Comment = fetch_comment(&state.pool, ticket_id, id).await?.try_into()?;

    // Editing follows the ownership rule: the author, or an admin.
    if old.author_id != auth.user_id && auth.role != crate::authz::Role::Admin {
        return Err(AppError::forbidden("not allowed to edit this comment"));
    }

    if payload.content.trim().is_empty() {
        return Err(AppError::bad_request("comment must not be empty"));
    }

    let now = utc_now();

    // is_internal is immutable once created; only content and edited_at move.
    sqlx::query("UPDATE comments SET content = ?, edited_at = ? WHERE id = ?")
        .bind(&payload.content)
        .bind(now)
        .bind(id)
        .execute(&state.pool)
        .await?;

    let comment: Comment = fetch_comment(&state.pool, ticket_id, id).await?.try_into()?;

    let ctx = RequestContext::from_headers(&headers);
    state
        .audit
        .record_entity(Some(auth.user_id), "updated", &comment, Some(&old), Some(ctx));

    Ok(Json(comment))
}

#[utoipa::path(
    delete,
    path = "/tickets/{ticket_id}/comments/{id}",
    tag = "Comments",
    params(
        ("ticket_id" = Uuid, Path, description = "Ticket id"),
        ("id" = Uuid, Path, description = "Comment id")
    ),
    responses((status = 204, description = "Comment deleted"))
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: axum::http::HeaderMap,
    Path((ticket_id, id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let ticket: Ticket = fetch_ticket(&state.pool, ticket_id).await?.try_into()?;
    let comment: Comment = fetch_comment(&state.pool, ticket_id, id).await?.try_into()?;

    let ctx = TicketContext::for_ticket(&ticket).with_owner(comment.author_id);
    if !state.policy.can(&auth.actor(), TicketAction::DeleteComment, &ctx) {
        return Err(AppError::forbidden("not allowed to delete this comment"));
    }

    let affected = sqlx::query("DELETE FROM comments WHERE id = ? AND ticket_id = ?")
        .bind(id)
        .bind(ticket_id)
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("comment not found"));
    }

    let ctx = RequestContext::from_headers(&headers);
    state
        .audit
        .record_entity(Some(auth.user_id), "deleted", &comment, None, Some(ctx));

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_comment(pool: &SqlitePool, ticket_id: Uuid, comment_id: Uuid) -> AppResult<DbComment> {
    let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ? AND ticket_id = ?");
    let comment = sqlx::query_as::<_, DbComment>(&sql)
        .bind(comment_id)
        .bind(ticket_id)
        .fetch_optional(pool)
        .await?;

    comment.ok_or_else(|| AppError::not_found("comment not found"))
}
