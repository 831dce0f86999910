//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::{api, error, models};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Card Shop Identity Sync",
        version = "0.1.0",
        description = "Keeps shops, users and memberships in step with the identity provider"
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        // Health endpoints
        api::health::health,
        api::health::ready,
        // Webhook intake
        api::webhooks::receive_webhook,
        // Admin endpoints
        api::audit::audit_report,
        api::audit::run_audit,
    ),
    components(
        schemas(
            // Common
            error::ErrorResponse,
            // Health
            api::health::HealthResponse,
            api::health::ReadyResponse,
            // Webhooks
            api::webhooks::WebhookAck,
            api::webhooks::WebhookOutcome,
            // Audit
            models::AuditOptions,
            models::AuditReport,
            models::AuditFailure,
            models::MissingMember,
            models::RepairSummary,
            models::RoleMismatch,
            models::ShopDrift,
            models::StaleMember,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Webhooks", description = "Signed identity provider events"),
        (name = "Admin", description = "Consistency audit and repair")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Add admin key security scheme.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "admin_key",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new(crate::config::ADMIN_KEY_HEADER),
                    ),
                ),
            );
        }
    }
}
