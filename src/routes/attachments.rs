use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::audit::RequestContext;
use crate::authz::{TicketAction, TicketContext};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::attachment::{Attachment, DbAttachment};
use crate::models::ticket::Ticket;
use crate::routes::tickets::fetch_ticket;
use crate::utils::utc_now;

const ATTACHMENT_COLUMNS: &str =
    "id, ticket_id, uploaded_by, original_name, stored_name, size, mime_type, created_at";

#[utoipa::path(
    get,
    path = "/tickets/{ticket_id}/attachments",
    tag = "Attachments",
    params(("ticket_id" = Uuid, Path, description = "Ticket id")),
    responses((status = 200, description = "List attachments", body = [Attachment]))
)]
pub async fn list_attachments(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    auth: AuthUser,
) -> AppResult<Json<Vec<Attachment>>> {
    let ticket: Ticket = fetch_ticket(&state.pool, ticket_id).await?.try_into()?;

    let ctx = TicketContext::for_ticket(&ticket);
    if !state.policy.can(&auth.actor(), TicketAction::View, &ctx) {
        return Err(AppError::forbidden("not allowed to view this ticket"));
    }

    let sql = format!(
        "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE ticket_id = ? ORDER BY created_at ASC"
    );
    let rows = sqlx::query_as::<_, DbAttachment>(&sql)
        .bind(ticket_id)
        .fetch_all(&state.pool)
        .await?;

    let attachments: Vec<Attachment> = rows
        .into_iter()
        .map(Attachment::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(attachments))
}

#[utoipa::path(
    post,
    path = "/tickets/{ticket_id}/attachments",
    tag = "Attachments",
    params(("ticket_id" = Uuid, Path, description = "Ticket id")),
    responses((status = 201, description = "Attachment uploaded", body = Attachment))
)]
pub async fn upload_attachment(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    auth: AuthUser,
    headers: axum::http::HeaderMap,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<Attachment>)> {
    let ticket: Ticket = fetch_ticket(&state.pool, ticket_id).await?.try_into()?;

    let ctx = TicketContext::for_ticket(&ticket);
    if !state.policy.can(&auth.actor(), TicketAction::Attach, &ctx) {
        return Err(AppError::forbidden("not allowed to attach files to this ticket"));
    }

    let field = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("invalid multipart body: {e}")))?
        .ok_or_else(|| AppError::bad_request("missing file field"))?;

    let original_name = field
        .file_name()
        .map(sanitize_filename)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::bad_request("missing file name"))?;
    let mime_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|e| AppError::bad_request(format!("failed to read upload: {e}")))?;

    if bytes.is_empty() {
        return Err(AppError::bad_request("empty upload"));
    }

    // Bytes first, metadata second; a failed insert must not leave an
    // orphaned object behind.
    let stored_name = state.files.save(&bytes).await?;

    let attachment_id = Uuid::new_v4();
    let now = utc_now();

    let inserted = sqlx::query(
        "INSERT INTO attachments (id, ticket_id, uploaded_by, original_name, stored_name, size, mime_type, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(attachment_id)
    .bind(ticket_id)
    .bind(auth.user_id)
    .bind(&original_name)
    .bind(&stored_name)
    .bind(bytes.len() as i64)
    .bind(&mime_type)
    .bind(now)
    .execute(&state.pool)
    .await;

    if let Err(db_err) = inserted {
        if let Err(cleanup_err) = state.files.delete(&stored_name).await {
            // The object is now orphaned on disk; this is an integrity
            // problem distinct from the insert failure itself.
            tracing::error!(
                target: "integrity",
                stored_name = %stored_name,
                "failed to clean up orphaned upload: {cleanup_err}"
            );
        }
        return Err(db_err.into());
    }

    let attachment: Attachment =
        fetch_attachment(&state.pool, ticket_id, attachment_id).await?.try_into()?;

    let ctx = RequestContext::from_headers(&headers);
    state
        .audit
        .record_entity(Some(auth.user_id), "uploaded", &attachment, None, Some(ctx));

    Ok((StatusCode::CREATED, Json(attachment)))
}

#[utoipa::path(
    get,
    path = "/tickets/{ticket_id}/attachments/{id}",
    tag = "Attachments",
    params(
        ("ticket_id" = Uuid, Path, description = "Ticket id"),
        ("id" = Uuid, Path, description = "Attachment id")
    ),
    responses((status = 200, description = "Attachment bytes"))
)]
pub async fn download_attachment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((ticket_id, id)): Path<(Uuid, Uuid)>,
) -> AppResult<([(header::HeaderName, String); 2], Vec<u8>)> {
    let ticket: Ticket = fetch_ticket(&state.pool, ticket_id).await?.try_into()?;

    let ctx = TicketContext::for_ticket(&ticket);
    if !state.policy.can(&auth.actor(), TicketAction::View, &ctx) {
        return Err(AppError::forbidden("not allowed to view this ticket"));
    }

    let attachment = fetch_attachment(&state.pool, ticket_id, id).await?;
    let bytes = state.files.open(&attachment.stored_name).await?;

    Ok((
        [
            (header::CONTENT_TYPE, attachment.mime_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", attachment.original_name),
            ),
        ],
        bytes,
    ))
}

#[utoipa::path(
    delete,
    path = "/tickets/{ticket_id}/attachments/{id}",
    tag = "Attachments",
    params(
        ("ticket_id" = Uuid, Path, description = "Ticket id"),
        ("id" = Uuid, Path, description = "Attachment id")
    ),
    responses((status = 204, description = "Attachment deleted"))
)]
pub async fn delete_attachment(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: axum::http::HeaderMap,
    Path((ticket_id, id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    let ticket: Ticket = fetch_ticket(&state.pool, ticket_id).await?.try_into()?;
    let db_attachment = fetch_attachment(&state.pool, ticket_id, id).await?;

    let ctx = TicketContext::for_ticket(&ticket).with_owner(db_attachment.uploaded_by);
    if !state.policy.can(&auth.actor(), TicketAction::DeleteAttachment, &ctx) {
        return Err(AppError::forbidden("not allowed to delete this attachment"));
    }

    let affected = sqlx::query("DELETE FROM attachments WHERE id = ? AND ticket_id = ?")
        .bind(id)
        .bind(ticket_id)
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("attachment not found"));
    }

    // The record is authoritative; object removal is best-effort.
    if let Err(e) = state.files.delete(&db_attachment.stored_name).await {
        tracing::warn!(
            stored_name = %db_attachment.stored_name,
            "failed to remove attachment bytes: {e}"
        );
    }

    let attachment: Attachment = db_attachment.try_into()?;
    let ctx = RequestContext::from_headers(&headers);
    state
        .audit
        .record_entity(Some(auth.user_id), "deleted", &attachment, None, Some(ctx));

    Ok(StatusCode::NO_CONTENT)
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '"' => '_',
            _ => c,
        })
        .collect()
}

async fn fetch_attachment(
    pool: &SqlitePool,
    ticket_id: Uuid,
    attachment_id: Uuid,
) -> AppResult<DbAttachment> {
    let sql = format!("SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE id = ? AND ticket_id = ?");
    let attachment = sqlx::query_as::<_, DbAttachment>(&sql)
        .bind(attachment_id)
        .bind(ticket_id)
        .fetch_optional(pool)
        .await?;

    attachment.ok_or_else(|| AppError::not_found("attachment not found"))
}
