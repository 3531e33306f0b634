use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity levels for audit entries. Controls retention policies and log
/// filtering downstream; the recorder itself never rotates anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Long-term retention, never auto-delete
    Critical,
    /// Medium-term retention (default)
    Important,
    /// Aggressively trimmed (e.g. logins)
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Important
    }
}

/// Trait for entities that show up in the audit trail. Implement on a model
/// to enable declarative recording from handlers.
pub trait Auditable: Serialize + Send + Sync {
    /// The resource type name (e.g. "ticket", "comment"); becomes the prefix
    /// in actions like "ticket.updated".
    fn entity_type() -> &'static str;

    /// The resource id (usually the entity's primary key)
    fn subject_id(&self) -> Uuid;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    /// Override severity based on action (e.g. "deleted" -> Critical)
    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" => Severity::Critical,
            "created" | "updated" => self.severity(),
            _ => Severity::Important,
        }
    }
}
