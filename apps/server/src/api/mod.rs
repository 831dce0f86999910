//! API endpoint modules.

pub mod audit;
pub mod health;
pub mod openapi;
pub mod webhooks;

pub use audit::configure_routes as configure_audit_routes;
pub use health::configure_health_routes;
pub use openapi::ApiDoc;
pub use webhooks::configure_routes as configure_webhook_routes;
