use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Attachment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub uploaded_by: Uuid,
    #[schema(example = "boot_log.txt")]
    pub original_name: String,
    pub size: i64,
    #[schema(example = "text/plain")]
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

impl crate::audit::Auditable for Attachment {
    fn entity_type() -> &'static str { "attachment" }
    fn subject_id(&self) -> Uuid { self.id }
}

/// Row shape; `stored_name` is the on-disk object key and stays out of the
/// API type.
#[derive(Debug, Clone, FromRow)]
pub struct DbAttachment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub uploaded_by: Uuid,
    pub original_name: String,
    pub stored_name: String,
    pub size: i64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbAttachment> for Attachment {
    type Error = AppError;

    fn try_from(value: DbAttachment) -> Result<Self, Self::Error> {
        Ok(Attachment {
            id: value.id,
            ticket_id: value.ticket_id,
            uploaded_by: value.uploaded_by,
            original_name: value.original_name,
            size: value.size,
            mime_type: value.mime_type,
            created_at: value.created_at,
        })
    }
}
