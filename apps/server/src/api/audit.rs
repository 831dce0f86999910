//! Admin endpoints for the consistency auditor.

use actix_web::{HttpResponse, get, post, web};

use crate::auth::AdminAuth;
use crate::error::{AppError, AppResult};
use crate::models::{AuditOptions, AuditReport};
use crate::services::Auditor;

/// Configure admin audit routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(audit_report).service(run_audit);
}

fn require_auditor(auditor: Option<web::Data<Auditor>>) -> AppResult<web::Data<Auditor>> {
    auditor.ok_or_else(|| {
        AppError::NotConfigured(
            "Auditing requires CLERK_SECRET_KEY to reach the identity provider".to_string(),
        )
    })
}

/// Report drift without changing anything.
///
/// GET /api/admin/sync/audit
/// Authorization: X-Admin-Key
#[utoipa::path(
    get,
    path = "/api/admin/sync/audit",
    tag = "Admin",
    responses(
        (status = 200, description = "Audit report", body = AuditReport),
        (status = 401, description = "Missing or invalid admin key"),
        (status = 502, description = "Identity provider unreachable"),
        (status = 503, description = "Identity provider access not configured")
    ),
    security(
        ("admin_key" = [])
    )
)]
#[get("/admin/sync/audit")]
pub async fn audit_report(
    _auth: AdminAuth,
    auditor: Option<web::Data<Auditor>>,
) -> AppResult<HttpResponse> {
    let auditor = require_auditor(auditor)?;
    let report = auditor.run(AuditOptions::report_only()).await?;
    Ok(HttpResponse::Ok().json(report))
}

/// Run an audit, optionally repairing shops and memberships.
///
/// POST /api/admin/sync/audit?repair=true&fix_roles=true
/// Authorization: X-Admin-Key
#[utoipa::path(
    post,
    path = "/api/admin/sync/audit",
    tag = "Admin",
    params(AuditOptions),
    responses(
        (status = 200, description = "Audit report including repairs", body = AuditReport),
        (status = 401, description = "Missing or invalid admin key"),
        (status = 502, description = "Identity provider unreachable"),
        (status = 503, description = "Identity provider access not configured")
    ),
    security(
        ("admin_key" = [])
    )
)]
#[post("/admin/sync/audit")]
pub async fn run_audit(
    _auth: AdminAuth,
    query: web::Query<AuditOptions>,
    auditor: Option<web::Data<Auditor>>,
) -> AppResult<HttpResponse> {
    let auditor = require_auditor(auditor)?;
    let report = auditor.run(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(report))
}
