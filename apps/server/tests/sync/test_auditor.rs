//! Consistency auditor: detection, repair and pruning.

use std::sync::Arc;

use actix_web::test;
use cardshop_sync_lib::db;
use cardshop_sync_lib::entity::shop_settings;
use cardshop_sync_lib::models::AuditOptions;
use cardshop_sync_lib::services::{Auditor, SyncService};
use sea_orm::EntityTrait;

use super::fake_identity_provider::FakeIdentityProvider;
use super::test_helpers::*;

fn build_auditor(sync: &SyncService, provider: &Arc<FakeIdentityProvider>) -> Auditor {
    Auditor::new(sync.pool().clone(), provider.clone())
}

fn repair() -> AuditOptions {
    AuditOptions {
        repair: true,
        fix_roles: false,
    }
}

fn fix_roles() -> AuditOptions {
    AuditOptions {
        repair: false,
        fix_roles: true,
    }
}

/// Local user linked to a shop.
async fn linked_user(sync: &SyncService, clerk_id: &str, email: &str, shop_id: &str, role: &str) {
    sync.upsert_user(clerk_id, Some(email), None, None)
        .await
        .unwrap();
    sync.upsert_membership(shop_id, Some(email), role)
        .await
        .unwrap()
        .expect("shop and user exist");
}

#[actix_rt::test]
async fn test_missing_and_orphaned_shops_are_detected_in_both_directions() {
    let pool = create_test_pool().await;
    let sync = SyncService::new(pool.clone());
    let provider = Arc::new(FakeIdentityProvider::new());

    provider.add_org("org_a", "Alpha", "alpha");
    provider.add_org("org_b", "Beta", "beta");
    sync.upsert_shop("org_a", "Alpha", Some("alpha"), None)
        .await
        .unwrap();
    sync.upsert_shop("org_c", "Gamma", Some("gamma"), None)
        .await
        .unwrap();

    let auditor = build_auditor(&sync, &provider);
    let report = auditor.run(AuditOptions::report_only()).await.unwrap();

    assert_eq!(report.missing_shops, vec!["org_b".to_string()]);
    assert_eq!(report.orphaned_shops, vec!["org_c".to_string()]);
    assert!(report.drifted_shops.is_empty());
    assert!(!report.is_clean());
    assert_eq!(count_shops(&pool).await, 2);

    let report = auditor.run(repair()).await.unwrap();
    assert_eq!(report.repairs.shops_created, 1);
    assert!(report.failures.is_empty());
    assert_eq!(count_shops(&pool).await, 3);
    assert_eq!(count_settings(&pool).await, 3);

    // The orphan is reported again and never removed by repair.
    let report = auditor.run(repair()).await.unwrap();
    assert!(report.missing_shops.is_empty());
    assert_eq!(report.orphaned_shops, vec!["org_c".to_string()]);
    assert_eq!(report.repairs.shops_created, 0);
    assert!(
        db::shops::find_by_id(pool.connection(), "org_c")
            .await
            .unwrap()
            .is_some()
    );
}

#[actix_rt::test]
async fn test_name_and_slug_drift_is_reported_then_repaired() {
    let pool = create_test_pool().await;
    let sync = SyncService::new(pool.clone());
    let provider = Arc::new(FakeIdentityProvider::new());

    provider.add_org("org_a", "New Name", "new-name");
    sync.upsert_shop("org_a", "Old Name", Some("old-name"), None)
        .await
        .unwrap();

    let auditor = build_auditor(&sync, &provider);
    let report = auditor.run(AuditOptions::report_only()).await.unwrap();

    assert_eq!(report.drifted_shops.len(), 1);
    let drift = &report.drifted_shops[0];
    assert_eq!(drift.shop_id, "org_a");
    assert_eq!(drift.local_name, "Old Name");
    assert_eq!(drift.remote_name, "New Name");
    assert_eq!(drift.local_slug, "old-name");
    assert_eq!(drift.remote_slug, "new-name");

    let unchanged = db::shops::find_by_id(pool.connection(), "org_a")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.name, "Old Name");

    let report = auditor.run(repair()).await.unwrap();
    assert_eq!(report.repairs.shops_updated, 1);

    let shop = db::shops::find_by_id(pool.connection(), "org_a")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shop.name, "New Name");
    assert_eq!(shop.slug, "new-name");

    let report = auditor.run(AuditOptions::report_only()).await.unwrap();
    assert!(report.drifted_shops.is_empty());
    assert!(report.is_clean());
}

#[actix_rt::test]
async fn test_role_mismatch_uses_normalized_roles() {
    let pool = create_test_pool().await;
    let sync = SyncService::new(pool.clone());
    let provider = Arc::new(FakeIdentityProvider::new());

    provider.add_org("org_a", "Alpha", "alpha");
    sync.upsert_shop("org_a", "Alpha", Some("alpha"), None)
        .await
        .unwrap();

    // Same role spelled differently is not drift.
    linked_user(&sync, "user_1", "owner@example.com", "org_a", "admin").await;
    provider.add_member("org_a", "user_1", "owner@example.com", "org:admin");

    // A genuinely different role is.
    linked_user(&sync, "user_2", "clerk@example.com", "org_a", "org:member").await;
    provider.add_member("org_a", "user_2", "clerk@example.com", "org:admin");

    let auditor = build_auditor(&sync, &provider);
    let report = auditor.run(AuditOptions::report_only()).await.unwrap();

    assert_eq!(report.role_mismatches.len(), 1);
    let mismatch = &report.role_mismatches[0];
    assert_eq!(mismatch.email, "clerk@example.com");
    assert_eq!(mismatch.expected_role, "org:admin");
    assert_eq!(mismatch.actual_role.as_deref(), Some("org:member"));
    assert_eq!(mismatch.actual_shop_id.as_deref(), Some("org_a"));

    // Report-only leaves the row alone.
    let user = user_by_email(&pool, "clerk@example.com").await.unwrap();
    assert_eq!(user.role.as_deref(), Some("org:member"));

    let report = auditor.run(fix_roles()).await.unwrap();
    assert_eq!(report.repairs.memberships_fixed, 1);
    assert_eq!(report.repairs.users_upserted, 0);

    let user = user_by_email(&pool, "clerk@example.com").await.unwrap();
    assert_eq!(user.role.as_deref(), Some("org:admin"));
    let untouched = user_by_email(&pool, "owner@example.com").await.unwrap();
    assert_eq!(untouched.role.as_deref(), Some("admin"));

    let report = auditor.run(AuditOptions::report_only()).await.unwrap();
    assert!(report.role_mismatches.is_empty());
}

#[actix_rt::test]
async fn test_unassigned_member_is_linked_by_fix_roles() {
    let pool = create_test_pool().await;
    let sync = SyncService::new(pool.clone());
    let provider = Arc::new(FakeIdentityProvider::new());

    provider.add_org("org_a", "Alpha", "alpha");
    sync.upsert_shop("org_a", "Alpha", Some("alpha"), None)
        .await
        .unwrap();
    sync.upsert_user("user_1", Some("staff@example.com"), None, None)
        .await
        .unwrap();
    provider.add_member("org_a", "user_1", "staff@example.com", "org:member");

    let auditor = build_auditor(&sync, &provider);
    let report = auditor.run(AuditOptions::report_only()).await.unwrap();
    assert_eq!(report.role_mismatches.len(), 1);
    assert_eq!(report.role_mismatches[0].actual_shop_id, None);
    assert_eq!(report.unassigned_users, vec!["staff@example.com".to_string()]);

    auditor.run(fix_roles()).await.unwrap();

    let user = user_by_email(&pool, "staff@example.com").await.unwrap();
    assert_eq!(user.shop_id.as_deref(), Some("org_a"));
    assert_eq!(user.role.as_deref(), Some("org:member"));
}

#[actix_rt::test]
async fn test_missing_member_is_created_from_provider_profile() {
    let pool = create_test_pool().await;
    let sync = SyncService::new(pool.clone());
    let provider = Arc::new(FakeIdentityProvider::new());

    provider.add_org("org_a", "Alpha", "alpha");
    provider.add_user("user_new", "new@example.com", Some("Newbie"));
    provider.add_member("org_a", "user_new", "new@example.com", "org:member");
    sync.upsert_shop("org_a", "Alpha", Some("alpha"), None)
        .await
        .unwrap();

    let auditor = build_auditor(&sync, &provider);
    let report = auditor.run(AuditOptions::report_only()).await.unwrap();

    assert_eq!(report.missing_members.len(), 1);
    assert_eq!(report.missing_members[0].clerk_user_id, "user_new");
    assert_eq!(report.missing_members[0].email, "new@example.com");
    assert_eq!(count_users(&pool).await, 0);

    let report = auditor.run(fix_roles()).await.unwrap();
    assert_eq!(report.repairs.users_upserted, 1);
    assert_eq!(report.repairs.memberships_fixed, 1);
    assert!(report.failures.is_empty());

    let user = user_by_email(&pool, "new@example.com").await.unwrap();
    assert_eq!(user.clerk_id, "user_new");
    assert_eq!(user.name.as_deref(), Some("Newbie"));
    assert_eq!(user.shop_id.as_deref(), Some("org_a"));
    assert_eq!(user.role.as_deref(), Some("org:member"));
}

#[actix_rt::test]
async fn test_member_unknown_to_provider_is_skipped_alone() {
    let pool = create_test_pool().await;
    let sync = SyncService::new(pool.clone());
    let provider = Arc::new(FakeIdentityProvider::new());

    provider.add_org("org_a", "Alpha", "alpha");
    provider.add_org("org_b", "Beta", "beta");
    sync.upsert_shop("org_a", "Alpha", Some("alpha"), None)
        .await
        .unwrap();
    sync.upsert_shop("org_b", "Beta", Some("beta"), None)
        .await
        .unwrap();

    // org_a lists a member whose profile cannot be fetched, next to a local
    // user whose role drifted.
    provider.add_member("org_a", "user_ghost", "ghost@example.com", "org:member");
    linked_user(&sync, "user_staff", "staff@example.com", "org_a", "org:member").await;
    provider.add_member("org_a", "user_staff", "staff@example.com", "org:admin");
    provider.add_user("user_ok", "ok@example.com", None);
    provider.add_member("org_b", "user_ok", "ok@example.com", "org:admin");

    let auditor = build_auditor(&sync, &provider);
    let report = auditor.run(fix_roles()).await.unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].shop_id, "org_a");
    assert_eq!(report.failures[0].step, "fetch_user");
    assert!(report.failures[0].error.contains("user_ghost"));
    assert!(user_by_email(&pool, "ghost@example.com").await.is_none());

    // The rest of org_a's fixes still applied.
    let staff = user_by_email(&pool, "staff@example.com").await.unwrap();
    assert_eq!(staff.role.as_deref(), Some("org:admin"));
    assert_eq!(report.repairs.memberships_fixed, 2);

    let user = user_by_email(&pool, "ok@example.com").await.unwrap();
    assert_eq!(user.shop_id.as_deref(), Some("org_b"));
}

#[actix_rt::test]
async fn test_member_listing_failure_is_isolated() {
    let pool = create_test_pool().await;
    let sync = SyncService::new(pool.clone());
    let provider = Arc::new(FakeIdentityProvider::new());

    provider.add_org("org_a", "Alpha", "alpha");
    provider.add_org("org_b", "Beta", "beta");
    provider.add_org("org_new", "Fresh", "fresh");
    sync.upsert_shop("org_a", "Alpha", Some("alpha"), None)
        .await
        .unwrap();
    sync.upsert_shop("org_b", "Beta", Some("beta"), None)
        .await
        .unwrap();
    provider.fail_members_for("org_a");
    provider.add_user("user_1", "one@example.com", None);
    provider.add_member("org_b", "user_1", "one@example.com", "org:member");

    let auditor = build_auditor(&sync, &provider);
    let report = auditor
        .run(AuditOptions {
            repair: true,
            fix_roles: true,
        })
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].shop_id, "org_a");
    assert_eq!(report.failures[0].step, "list_members");

    // The other shops were still repaired.
    assert_eq!(report.repairs.shops_created, 1);
    assert_eq!(report.repairs.memberships_fixed, 1);
    let user = user_by_email(&pool, "one@example.com").await.unwrap();
    assert_eq!(user.shop_id.as_deref(), Some("org_b"));
}

#[actix_rt::test]
async fn test_multi_org_member_is_consistent_and_stale_member_reported() {
    let pool = create_test_pool().await;
    let sync = SyncService::new(pool.clone());
    let provider = Arc::new(FakeIdentityProvider::new());

    provider.add_org("org_a", "Alpha", "alpha");
    provider.add_org("org_b", "Beta", "beta");
    sync.upsert_shop("org_a", "Alpha", Some("alpha"), None)
        .await
        .unwrap();
    sync.upsert_shop("org_b", "Beta", Some("beta"), None)
        .await
        .unwrap();

    // Listed by both organizations, stored against org_b.
    linked_user(&sync, "user_multi", "multi@example.com", "org_b", "org:member").await;
    provider.add_member("org_a", "user_multi", "multi@example.com", "org:admin");
    provider.add_member("org_b", "user_multi", "multi@example.com", "org:member");

    // Stored against org_a but no longer listed there.
    linked_user(&sync, "user_left", "left@example.com", "org_a", "org:member").await;

    let auditor = build_auditor(&sync, &provider);
    let report = auditor.run(AuditOptions::report_only()).await.unwrap();

    assert!(report.role_mismatches.is_empty());
    assert!(report.missing_members.is_empty());
    assert_eq!(report.stale_members.len(), 1);
    assert_eq!(report.stale_members[0].shop_id, "org_a");
    assert_eq!(report.stale_members[0].email, "left@example.com");

    // Stale members are never unlinked automatically.
    auditor.run(fix_roles()).await.unwrap();
    let user = user_by_email(&pool, "left@example.com").await.unwrap();
    assert_eq!(user.shop_id.as_deref(), Some("org_a"));
}

#[actix_rt::test]
async fn test_orphaned_and_unassigned_users_are_reported() {
    let pool = create_test_pool().await;
    let sync = SyncService::new(pool.clone());
    let provider = Arc::new(FakeIdentityProvider::new());

    let dangling = sync
        .upsert_user("user_1", Some("dangling@example.com"), None, None)
        .await
        .unwrap()
        .unwrap();
    db::users::set_membership(
        pool.connection(),
        dangling.id,
        Some("org_vanished"),
        Some("org:member"),
    )
    .await
    .unwrap();
    sync.upsert_user("user_2", Some("loose@example.com"), None, None)
        .await
        .unwrap();

    let auditor = build_auditor(&sync, &provider);
    let report = auditor.run(AuditOptions::report_only()).await.unwrap();

    assert_eq!(report.orphaned_users, vec!["dangling@example.com".to_string()]);
    assert_eq!(report.unassigned_users, vec!["loose@example.com".to_string()]);
    assert_eq!(count_users(&pool).await, 2);
}

#[actix_rt::test]
async fn test_missing_settings_are_backfilled() {
    let pool = create_test_pool().await;
    let sync = SyncService::new(pool.clone());
    let provider = Arc::new(FakeIdentityProvider::new());

    provider.add_org("org_a", "Alpha", "alpha");
    sync.upsert_shop("org_a", "Alpha", Some("alpha"), None)
        .await
        .unwrap();
    shop_settings::Entity::delete_by_id("org_a".to_string())
        .exec(pool.connection())
        .await
        .unwrap();
    assert_eq!(count_settings(&pool).await, 0);

    let auditor = build_auditor(&sync, &provider);
    let report = auditor.run(AuditOptions::report_only()).await.unwrap();
    assert_eq!(report.missing_settings, vec!["org_a".to_string()]);
    assert_eq!(count_settings(&pool).await, 0);

    let report = auditor.run(repair()).await.unwrap();
    assert_eq!(report.repairs.settings_backfilled, 1);
    assert_eq!(count_settings(&pool).await, 1);

    let report = auditor.run(AuditOptions::report_only()).await.unwrap();
    assert!(report.missing_settings.is_empty());
}

#[actix_rt::test]
async fn test_prune_orphans_rechecks_provider() {
    let pool = create_test_pool().await;
    let sync = SyncService::new(pool.clone());
    let provider = Arc::new(FakeIdentityProvider::new());

    provider.add_org("org_a", "Alpha", "alpha");
    sync.upsert_shop("org_a", "Alpha", Some("alpha"), None)
        .await
        .unwrap();
    sync.upsert_shop("org_c", "Gamma", Some("gamma"), None)
        .await
        .unwrap();

    let auditor = build_auditor(&sync, &provider);
    let report = auditor
        .prune_orphans(&[
            "org_a".to_string(),
            "org_c".to_string(),
            "org_unknown".to_string(),
        ])
        .await
        .unwrap();

    assert_eq!(report.still_active, vec!["org_a".to_string()]);
    assert_eq!(report.pruned, vec!["org_c".to_string()]);
    assert_eq!(report.not_found, vec!["org_unknown".to_string()]);
    assert!(report.failures.is_empty());
    assert_eq!(count_shops(&pool).await, 1);
    assert_eq!(count_settings(&pool).await, 1);

    // Once the provider drops it, the same shop can be pruned.
    provider.remove_org("org_a");
    let report = auditor.prune_orphans(&["org_a".to_string()]).await.unwrap();
    assert_eq!(report.pruned, vec!["org_a".to_string()]);
    assert!(report.still_active.is_empty());
    assert_eq!(count_shops(&pool).await, 0);
}

#[actix_rt::test]
async fn test_admin_audit_requires_key() {
    let pool = create_test_pool().await;
    let sync = SyncService::new(pool.clone());
    let provider = Arc::new(FakeIdentityProvider::new());
    provider.add_org("org_a", "Alpha", "alpha");

    let auditor = Arc::new(build_auditor(&sync, &provider));
    let app = create_test_app(&pool, Some(auditor)).await;

    let (status, body) = send(&app, test::TestRequest::get().uri("/api/admin/sync/audit")).await;
    assert_eq!(status, 401);
    assert_eq!(body["error"], "UNAUTHORIZED");

    let req = test::TestRequest::get()
        .uri("/api/admin/sync/audit")
        .insert_header(("X-Admin-Key", "wrong-key"));
    let (status, _) = send(&app, req).await;
    assert_eq!(status, 401);

    let req = test::TestRequest::get()
        .uri("/api/admin/sync/audit")
        .insert_header(("X-Admin-Key", TEST_ADMIN_KEY));
    let (status, body) = send(&app, req).await;
    assert_eq!(status, 200);
    assert_eq!(body["missing_shops"][0], "org_a");
    assert_eq!(count_shops(&pool).await, 0);
}

#[actix_rt::test]
async fn test_admin_audit_repair_through_http() {
    let pool = create_test_pool().await;
    let sync = SyncService::new(pool.clone());
    let provider = Arc::new(FakeIdentityProvider::new());
    provider.add_org("org_a", "Alpha", "alpha");

    let auditor = Arc::new(build_auditor(&sync, &provider));
    let app = create_test_app(&pool, Some(auditor)).await;

    let req = test::TestRequest::post()
        .uri("/api/admin/sync/audit?repair=true")
        .insert_header(("X-Admin-Key", TEST_ADMIN_KEY));
    let (status, body) = send(&app, req).await;

    assert_eq!(status, 200);
    assert_eq!(body["repairs"]["shops_created"], 1);
    assert_eq!(count_shops(&pool).await, 1);
}

#[actix_rt::test]
async fn test_admin_audit_without_provider_is_unavailable() {
    let pool = create_test_pool().await;
    let app = create_test_app(&pool, None).await;

    let req = test::TestRequest::get()
        .uri("/api/admin/sync/audit")
        .insert_header(("X-Admin-Key", TEST_ADMIN_KEY));
    let (status, body) = send(&app, req).await;

    assert_eq!(status, 503);
    assert_eq!(body["error"], "NOT_CONFIGURED");
}
