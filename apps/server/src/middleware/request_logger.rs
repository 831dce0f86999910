//! Request logging middleware.
//!
//! Opens a span per request carrying the webhook message id, so a delivery
//! can be followed through the engine's logs, and logs the outcome with its
//! timing.

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::{ADMIN_KEY_HEADER, WEBHOOK_ID_HEADER};

/// Request logger middleware factory.
pub struct RequestLogger;

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggerMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggerMiddleware { service }))
    }
}

/// Request logger middleware service.
pub struct RequestLoggerMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestLoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start = Instant::now();
        let remote_addr = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();

        // Webhook deliveries are traced by message id; signatures are never logged.
        let webhook_id = req
            .headers()
            .get(WEBHOOK_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();

        // Everything the handler logs, engine and auditor included, lands in this span.
        let span = info_span!(
            target: "api",
            "request",
            method = %req.method(),
            path = %req.path(),
            webhook_id = %webhook_id,
            admin = req.headers().contains_key(ADMIN_KEY_HEADER),
        );

        span.in_scope(|| {
            debug!(target: "api", remote_addr = %remote_addr, "→ Request started");
        });

        let fut = self.service.call(req).instrument(span.clone());

        Box::pin(async move {
            let res = fut.await?;
            let status = res.status();
            let duration_ms = start.elapsed().as_millis() as u64;
            let _entered = span.enter();

            if status.is_server_error() {
                error!(target: "api", status = status.as_u16(), duration_ms, "← Server error");
            } else if status.is_client_error() {
                warn!(target: "api", status = status.as_u16(), duration_ms, "← Client error");
            } else {
                info!(target: "api", status = status.as_u16(), duration_ms, "← Request completed");
            }

            Ok(res)
        })
    }
}
