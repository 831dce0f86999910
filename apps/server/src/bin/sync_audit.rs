//! CLI tool for the consistency auditor.
//!
//! Usage:
//!   cargo run --bin sync-audit -- report [--json]
//!   cargo run --bin sync-audit -- repair [--fix-roles] [--json]
//!   cargo run --bin sync-audit -- prune-orphans --confirm <shop-id>...

use std::env;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cardshop_sync_lib::config::Config;
use cardshop_sync_lib::db::DbPool;
use cardshop_sync_lib::models::{AuditOptions, AuditReport, PruneReport};
use cardshop_sync_lib::services::{Auditor, ClerkClient, IdentityProvider};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let command = args[1].as_str();
    if matches!(command, "help" | "--help" | "-h") {
        print_usage();
        return;
    }

    let json = has_flag(&args, "--json");

    let command_options = match command {
        "report" => Some(AuditOptions::report_only()),
        "repair" => Some(AuditOptions {
            repair: true,
            fix_roles: has_flag(&args, "--fix-roles"),
        }),
        "prune-orphans" => None,
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            std::process::exit(1);
        }
    };

    let auditor = connect().await;

    match command_options {
        Some(options) => run_audit(&auditor, options, json).await,
        None => {
            let shop_ids = parse_confirmed_ids(&args);
            prune_orphans(&auditor, &shop_ids, json).await;
        }
    }
}

async fn connect() -> Auditor {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };

    let client = match ClerkClient::new(&config.identity) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error creating identity provider client: {}", e);
            std::process::exit(1);
        }
    };

    let pool = match DbPool::new(&config).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error connecting to database: {}", e);
            std::process::exit(1);
        }
    };

    let provider: Arc<dyn IdentityProvider> = Arc::new(client);
    Auditor::new(pool, provider)
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().skip(2).any(|arg| arg == flag)
}

/// Shop ids following `--confirm`. Pruning without it is refused.
fn parse_confirmed_ids(args: &[String]) -> Vec<String> {
    let Some(pos) = args.iter().position(|arg| arg == "--confirm") else {
        eprintln!("Error: prune-orphans deletes shops and everything they own.");
        eprintln!("Pass --confirm followed by the shop ids from a previous report.");
        std::process::exit(1);
    };

    let ids: Vec<String> = args[pos + 1..]
        .iter()
        .filter(|arg| !arg.starts_with("--"))
        .cloned()
        .collect();

    if ids.is_empty() {
        eprintln!("Error: --confirm requires at least one shop id");
        std::process::exit(1);
    }
    ids
}

async fn run_audit(auditor: &Auditor, options: AuditOptions, json: bool) {
    let report = match auditor.run(options).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Audit failed: {}", e);
            std::process::exit(1);
        }
    };

    if json {
        print_json(&report);
    } else {
        print_report(&report, options);
    }

    if !report.failures.is_empty() {
        std::process::exit(2);
    }
}

async fn prune_orphans(auditor: &Auditor, shop_ids: &[String], json: bool) {
    let report = match auditor.prune_orphans(shop_ids).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Prune failed: {}", e);
            std::process::exit(1);
        }
    };

    if json {
        print_json(&report);
    } else {
        print_prune(&report);
    }

    if !report.failures.is_empty() {
        std::process::exit(2);
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => {
            eprintln!("Error serializing report: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_list(title: &str, items: &[String]) {
    println!("{} ({})", title, items.len());
    for item in items {
        println!("  {}", item);
    }
}

fn print_report(report: &AuditReport, options: AuditOptions) {
    println!();
    print_list("Missing shops", &report.missing_shops);
    print_list("Orphaned shops (never removed automatically)", &report.orphaned_shops);

    println!("Drifted shops ({})", report.drifted_shops.len());
    for drift in &report.drifted_shops {
        println!(
            "  {}: name {:?} -> {:?}, slug {:?} -> {:?}",
            drift.shop_id, drift.local_name, drift.remote_name, drift.local_slug, drift.remote_slug
        );
    }

    print_list("Shops missing settings", &report.missing_settings);

    println!("Role mismatches ({})", report.role_mismatches.len());
    for m in &report.role_mismatches {
        println!(
            "  {} in {}: expected {}, found {} in {}",
            m.email,
            m.shop_id,
            m.expected_role,
            m.actual_role.as_deref().unwrap_or("no role"),
            m.actual_shop_id.as_deref().unwrap_or("no shop")
        );
    }

    println!("Members without a local user ({})", report.missing_members.len());
    for m in &report.missing_members {
        println!("  {} ({}) in {} as {}", m.email, m.clerk_user_id, m.shop_id, m.role);
    }

    println!("Stale members ({})", report.stale_members.len());
    for m in &report.stale_members {
        println!("  {} in {}", m.email, m.shop_id);
    }

    print_list("Orphaned users", &report.orphaned_users);
    print_list("Unassigned users", &report.unassigned_users);

    if options.repair || options.fix_roles {
        let r = &report.repairs;
        println!();
        println!(
            "Repairs: {} shops created, {} shops updated, {} settings backfilled, {} users upserted, {} memberships fixed",
            r.shops_created, r.shops_updated, r.settings_backfilled, r.users_upserted, r.memberships_fixed
        );
    }

    if !report.failures.is_empty() {
        println!();
        println!("Failures ({})", report.failures.len());
        for f in &report.failures {
            println!("  {} [{}]: {}", f.shop_id, f.step, f.error);
        }
    }

    println!();
    if report.is_clean() {
        println!("No drift found.");
    }
}

fn print_prune(report: &PruneReport) {
    println!();
    print_list("Pruned", &report.pruned);
    print_list("Still listed by the identity provider", &report.still_active);
    print_list("Not found locally", &report.not_found);
    if !report.failures.is_empty() {
        println!("Failures ({})", report.failures.len());
        for f in &report.failures {
            println!("  {} [{}]: {}", f.shop_id, f.step, f.error);
        }
    }
    println!();
}

fn print_usage() {
    println!(
        r#"
Usage: sync-audit <command> [options]

Commands:
  report                         Report drift between the identity provider and the database
  repair [--fix-roles]           Create missing shops, fix name/slug drift, backfill settings;
                                 with --fix-roles also apply provider memberships
  prune-orphans --confirm <id>...
                                 Delete local shops the provider no longer lists
  help                           Show this help message

Options:
  --json                         Print the report as JSON

Environment:
  RUST_ENV            development or production
  DATABASE_URL        Postgres connection string
  CLERK_SECRET_KEY    Identity provider API key
  CLERK_API_URL       Identity provider API base URL (optional)
  CLERK_WEBHOOK_SECRET  Required by the shared configuration loader
"#
    );
}
