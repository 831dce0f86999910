//! Shared test helpers for sync E2E tests.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, dev::ServiceResponse, test, web};
use cardshop_sync_lib::auth::AdminKey;
use cardshop_sync_lib::db::DbPool;
use cardshop_sync_lib::entity::{shop, shop_settings, user};
use cardshop_sync_lib::models::{SyncEvent, User, WebhookEnvelope};
use cardshop_sync_lib::services::{Auditor, SyncService, WebhookVerifier};
use chrono::Utc;
use sea_orm::{ConnectOptions, Database, EntityTrait, PaginatorTrait};
use secrecy::SecretString;
use serde_json::{Value, json};
use uuid::Uuid;

/// Admin key used in tests.
pub const TEST_ADMIN_KEY: &str = "test-admin-key-for-sync-e2e";

/// Webhook signing secret used in tests.
pub const TEST_WEBHOOK_SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

/// Create a fresh in-memory database with all migrations applied.
///
/// The pool holds a single connection so every query sees the same memory
/// database. Never query the pool while a transaction on it is open.
pub async fn create_test_pool() -> DbPool {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(Duration::from_secs(3600))
        .max_lifetime(Duration::from_secs(3600))
        .sqlx_logging(false);

    let conn = Database::connect(options)
        .await
        .expect("Failed to open in-memory database");
    let pool = DbPool::from_connection(conn);
    pool.run_migrations()
        .await
        .expect("Failed to run migrations");
    pool
}

pub fn test_verifier() -> WebhookVerifier {
    WebhookVerifier::new(&SecretString::from(TEST_WEBHOOK_SECRET), 300)
        .expect("test secret is valid base64")
}

/// Create a test app with the same routes as the server.
pub async fn create_test_app(
    pool: &DbPool,
    auditor: Option<Arc<Auditor>>,
) -> impl actix_web::dev::Service<
    actix_http::Request,
    Response = ServiceResponse,
    Error = actix_web::Error,
> {
    let mut app = App::new()
        .app_data(web::Data::new(pool.clone()))
        .app_data(web::Data::new(test_verifier()))
        .app_data(web::Data::new(SyncService::new(pool.clone())))
        .app_data(web::Data::new(AdminKey::new(Some(TEST_ADMIN_KEY.to_string()))));

    if let Some(auditor) = auditor {
        app = app.app_data(web::Data::<Auditor>::from(auditor));
    }

    test::init_service(
        app.service(
            web::scope("/api")
                .configure(cardshop_sync_lib::api::configure_health_routes)
                .configure(cardshop_sync_lib::api::configure_webhook_routes)
                .configure(cardshop_sync_lib::api::configure_audit_routes),
        ),
    )
    .await
}

/// Build a webhook request signed with the test secret.
pub fn signed_request(body: Vec<u8>, sent_at: i64) -> test::TestRequest {
    let msg_id = format!("msg_{}", Uuid::new_v4().simple());
    let signature = test_verifier().sign(&msg_id, sent_at, &body);

    test::TestRequest::post()
        .uri("/api/webhooks")
        .insert_header(("content-type", "application/json"))
        .insert_header(("svix-id", msg_id))
        .insert_header(("svix-timestamp", sent_at.to_string()))
        .insert_header(("svix-signature", signature))
        .set_payload(body)
}

/// Serialize an event envelope.
pub fn envelope_body(event_type: &str, data: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": event_type,
        "object": "event",
        "data": data,
    }))
    .unwrap()
}

/// Send a request and return status and JSON body (`Null` when not JSON).
pub async fn send<S>(app: &S, req: test::TestRequest) -> (u16, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let resp = test::call_service(app, req.to_request()).await;
    let status = resp.status().as_u16();
    let bytes = test::read_body(resp).await;
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

/// Deliver a correctly signed event.
pub async fn deliver<S>(app: &S, event_type: &str, data: Value) -> (u16, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let req = signed_request(envelope_body(event_type, data), Utc::now().timestamp());
    send(app, req).await
}

/// Build a recognized event for direct engine dispatch.
pub fn sync_event(event_type: &str, data: Value) -> SyncEvent {
    SyncEvent::from_envelope(WebhookEnvelope {
        event_type: event_type.to_string(),
        data,
    })
    .expect("well-formed event")
    .expect("handled event type")
}

pub fn user_data(clerk_id: &str, email: &str, first: Option<&str>, last: Option<&str>) -> Value {
    json!({
        "id": clerk_id,
        "object": "user",
        "primary_email_address_id": "idn_primary",
        "email_addresses": [
            { "id": "idn_primary", "email_address": email }
        ],
        "first_name": first,
        "last_name": last,
    })
}

pub fn org_data(id: &str, name: &str, slug: Option<&str>) -> Value {
    json!({
        "id": id,
        "object": "organization",
        "name": name,
        "slug": slug,
    })
}

pub fn membership_data(org_id: &str, clerk_id: &str, email: &str, role: &str) -> Value {
    json!({
        "id": format!("orgmem_{}_{}", org_id, clerk_id),
        "object": "organization_membership",
        "role": role,
        "organization": { "id": org_id },
        "public_user_data": { "user_id": clerk_id, "identifier": email },
    })
}

pub fn deleted_data(id: &str) -> Value {
    json!({ "id": id, "deleted": true })
}

pub async fn count_users(pool: &DbPool) -> u64 {
    user::Entity::find().count(pool.connection()).await.unwrap()
}

pub async fn count_shops(pool: &DbPool) -> u64 {
    shop::Entity::find().count(pool.connection()).await.unwrap()
}

pub async fn count_settings(pool: &DbPool) -> u64 {
    shop_settings::Entity::find()
        .count(pool.connection())
        .await
        .unwrap()
}

pub async fn user_by_email(pool: &DbPool, email: &str) -> Option<User> {
    cardshop_sync_lib::db::users::find_by_email(pool.connection(), email)
        .await
        .unwrap()
}
