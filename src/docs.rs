use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::auth::register,
        routes::auth::login,
        routes::auth::me,
        routes::auth::logout,
        routes::tickets::list_tickets,
        routes::tickets::create_ticket,
        routes::tickets::get_ticket,
        routes::tickets::update_ticket,
        routes::tickets::assign_ticket,
        routes::comments::list_comments,
        routes::comments::create_comment,
        routes::comments::update_comment,
        routes::comments::delete_comment,
        routes::attachments::list_attachments,
        routes::attachments::upload_attachment,
        routes::attachments::download_attachment,
        routes::attachments::delete_attachment,
        routes::audit::list_audit_log,
        routes::audit::security_stats,
        routes::health::health
    ),
    components(
        schemas(
            models::user::User,
            models::user::AuthResponse,
            models::user::LoginRequest,
            models::user::RegisterRequest,
            models::ticket::Ticket,
            models::ticket::TicketCreateRequest,
            models::ticket::TicketUpdateRequest,
            models::ticket::TicketAssignRequest,
            models::ticket::TicketPriority,
            models::comment::Comment,
            models::comment::CommentCreateRequest,
            models::comment::CommentUpdateRequest,
            models::attachment::Attachment,
            models::audit::AuditLogEntry,
            routes::audit::SecurityStats,
            routes::audit::ActionCount,
            routes::audit::SeverityCount,
            routes::health::HealthResponse,
            crate::authz::Role,
            crate::authz::TicketStatus
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Tickets", description = "Ticket lifecycle and assignment"),
        (name = "Comments", description = "Ticket comment threads"),
        (name = "Attachments", description = "Ticket file attachments"),
        (name = "Audit", description = "Admin-only audit trail"),
        (name = "Health", description = "Service health")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn build_openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> SwaggerUi {
    let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
        .try_it_out_enabled(true)
        .with_credentials(true)
        .persist_authorization(true);

    SwaggerUi::new("/docs")
        .url("/api-docs/openapi.json", doc)
        .config(swagger_config)
}
