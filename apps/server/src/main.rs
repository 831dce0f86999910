//! Card shop identity sync - Main entry point.
//!
//! Starts the Actix-web server with the webhook intake, health and admin
//! audit routes, and the optional scheduled audit.

use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use cardshop_sync_lib::api::{self, ApiDoc};
use cardshop_sync_lib::auth::AdminKey;
use cardshop_sync_lib::config::Config;
use cardshop_sync_lib::db::DbPool;
use cardshop_sync_lib::middleware;
use cardshop_sync_lib::services::{
    self, Auditor, ClerkClient, IdentityProvider, SyncService, WebhookVerifier,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - CLERK_WEBHOOK_SECRET must be set");
            error!("  - In production, DATABASE_URL and SYNC_ADMIN_KEY must not match development defaults");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  Card Shop Identity Sync");
    info!("  Environment: {}", config.environment);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
    }

    let verifier = match WebhookVerifier::new(
        &config.webhook.signing_secret,
        config.webhook.tolerance_secs,
    ) {
        Ok(verifier) => verifier,
        Err(e) => {
            error!("CLERK_WEBHOOK_SECRET is unusable: {}", e);
            std::process::exit(1);
        }
    };

    let pool = match DbPool::new(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };
    info!("Database connection established");

    if let Err(e) = pool.run_migrations().await {
        error!("Failed to run migrations: {}", e);
        std::process::exit(1);
    }

    let sync_service = SyncService::new(pool.clone());

    // The auditor needs provider API access; without a secret key the admin
    // endpoints answer 503 and no schedule runs.
    let auditor = match ClerkClient::new(&config.identity) {
        Ok(client) => {
            let provider: Arc<dyn IdentityProvider> = Arc::new(client);
            Some(Arc::new(Auditor::new(pool.clone(), provider)))
        }
        Err(e) => {
            warn!("Consistency auditor disabled: {}", e);
            None
        }
    };

    match (&auditor, config.audit_interval_secs) {
        (Some(auditor), Some(interval_secs)) => {
            services::start_audit_task(auditor.clone(), interval_secs);
        }
        (None, Some(_)) => warn!("SYNC_AUDIT_INTERVAL_SECS is set but the auditor is disabled"),
        _ => {}
    }

    // Prepare shared state
    let bind_address = config.bind_address();
    let admin_key = AdminKey::new(config.admin_key.clone());
    if !admin_key.is_configured() {
        warn!("SYNC_ADMIN_KEY not set; admin audit endpoints will reject every request");
    }
    let verifier = web::Data::new(verifier);
    let sync_service = web::Data::new(sync_service);
    let auditor: Option<web::Data<Auditor>> = auditor.map(web::Data::from);
    let openapi = ApiDoc::openapi();

    let worker_count = if config.is_development() {
        info!(
            "Starting server at http://{} (4 workers - development mode)",
            bind_address
        );
        4
    } else {
        let cpus = num_cpus::get();
        info!(
            "Starting server at http://{} ({} workers)",
            bind_address, cpus
        );
        cpus
    };

    // Start HTTP server
    let server = HttpServer::new(move || {
        let mut app = App::new()
            // Add request logging middleware
            .wrap(middleware::RequestLogger)
            // Add shared state
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(admin_key.clone()))
            .app_data(verifier.clone())
            .app_data(sync_service.clone());

        if let Some(ref auditor) = auditor {
            app = app.app_data(auditor.clone());
        }

        // Swagger UI is registered ahead of the /api scope, which would
        // otherwise claim the /api/docs paths.
        app.service(SwaggerUi::new("/api/docs/{_:.*}").url("/api/openapi.json", openapi.clone()))
            .service(
                web::scope("/api")
                    .configure(api::configure_health_routes)
                    .configure(api::configure_webhook_routes)
                    .configure(api::configure_audit_routes),
            )
    });

    // Set worker count
    server
        .workers(worker_count)
        .bind(&bind_address)?
        .run()
        .await
}
