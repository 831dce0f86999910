//! Consistency auditor.
//!
//! Compares the identity provider's organizations and memberships with the
//! local shops and users, reports drift, and optionally repairs it through
//! the same operations the reconciliation engine uses. Destructive drift
//! (local shops the provider no longer lists) is only reported; pruning is a
//! separate explicit call.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use sea_orm::TransactionTrait;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::db::{self, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::user::normalize_email;
use crate::models::{
    AuditFailure, AuditOptions, AuditReport, BillingMetadata, MembershipPayload, MissingMember,
    OrganizationPayload, PruneReport, RoleMismatch, Shop, ShopDrift, ShopRole, StaleMember, User,
    UserPayload,
};
use crate::services::identity_provider::IdentityProvider;
use crate::services::sync::{self, ShopUpsert};

/// A membership correction queued for one shop.
enum MemberFix {
    /// Point an existing user at the shop with the provider's role.
    Link { email: String, role: String },
    /// Fetch the user from the provider, write it, then link it.
    CreateAndLink { clerk_user_id: String, role: String },
}

/// Writes made while applying one shop's membership fixes.
#[derive(Default)]
struct AppliedFixes {
    users: Vec<User>,
    users_upserted: usize,
    memberships_fixed: usize,
    /// Provider user ids listed as members but unknown to the provider
    unresolved: Vec<String>,
}

/// Batch drift detector and repairer.
pub struct Auditor {
    pool: DbPool,
    provider: Arc<dyn IdentityProvider>,
}

impl Auditor {
    pub fn new(pool: DbPool, provider: Arc<dyn IdentityProvider>) -> Self {
        Self { pool, provider }
    }

    /// Run one audit pass.
    ///
    /// Fails only when the provider's organization list or the local store
    /// cannot be read at all. Per-shop repair failures are recorded in the
    /// report and the run continues.
    pub async fn run(&self, options: AuditOptions) -> AppResult<AuditReport> {
        let conn = self.pool.connection();
        let mut report = AuditReport::default();

        info!(
            repair = options.repair,
            fix_roles = options.fix_roles,
            "Starting consistency audit"
        );

        let remote = self.provider.list_organizations().await?;
        let mut local_by_id: HashMap<String, Shop> = db::shops::list_all(conn)
            .await?
            .into_iter()
            .map(|shop| (shop.id.clone(), shop))
            .collect();
        let settings: HashSet<String> = db::shops::list_settings_shop_ids(conn)
            .await?
            .into_iter()
            .collect();

        // Shop sets in both directions.
        let remote_ids: HashSet<&str> = remote.iter().map(|org| org.id.as_str()).collect();
        let missing: Vec<&OrganizationPayload> = remote
            .iter()
            .filter(|org| !local_by_id.contains_key(&org.id))
            .collect();
        report.missing_shops = missing.iter().map(|org| org.id.clone()).collect();

        report.orphaned_shops = local_by_id
            .keys()
            .filter(|id| !remote_ids.contains(id.as_str()))
            .cloned()
            .collect();
        report.orphaned_shops.sort();

        report.missing_settings = local_by_id
            .keys()
            .filter(|id| !settings.contains(*id))
            .cloned()
            .collect();
        report.missing_settings.sort();

        if options.repair {
            for org in missing {
                match self.write_shop(org).await {
                    Ok(upsert) => {
                        report.repairs.shops_created += 1;
                        local_by_id.insert(org.id.clone(), upsert.shop);
                    }
                    Err(e) => record_failure(&mut report.failures, &org.id, "create_shop", &e),
                }
            }
        }

        for shop_id in &report.orphaned_shops {
            warn!(shop_id = %shop_id, "Local shop not listed by the identity provider");
        }

        // Name and slug drift.
        for org in &remote {
            let Some(local) = local_by_id.get(&org.id) else {
                continue;
            };
            let remote_slug = sync::resolve_slug(&org.id, &org.name, org.slug.as_deref());
            if local.name == org.name && local.slug == remote_slug {
                continue;
            }

            report.drifted_shops.push(ShopDrift {
                shop_id: org.id.clone(),
                local_name: local.name.clone(),
                remote_name: org.name.clone(),
                local_slug: local.slug.clone(),
                remote_slug,
            });

            if options.repair {
                match self.write_shop(org).await {
                    Ok(upsert) => {
                        report.repairs.shops_updated += 1;
                        if upsert.settings_backfilled {
                            report.repairs.settings_backfilled += 1;
                        }
                        local_by_id.insert(org.id.clone(), upsert.shop);
                    }
                    Err(e) => record_failure(&mut report.failures, &org.id, "update_shop", &e),
                }
            }
        }

        // Memberships.
        let mut users_by_email: HashMap<String, User> = db::users::list_all(conn)
            .await?
            .into_iter()
            .map(|user| (user.email.clone(), user))
            .collect();

        let mut rosters: Vec<(&OrganizationPayload, Vec<MembershipPayload>)> = Vec::new();
        let mut member_orgs: HashMap<String, HashSet<String>> = HashMap::new();
        for org in &remote {
            if !local_by_id.contains_key(&org.id) {
                debug!(shop_id = %org.id, "Skipping membership check for shop absent locally");
                continue;
            }
            match self.provider.list_organization_members(&org.id).await {
                Ok(members) => {
                    for member in &members {
                        if let Some(email) = member.email().and_then(normalize_email) {
                            member_orgs.entry(email).or_default().insert(org.id.clone());
                        }
                    }
                    rosters.push((org, members));
                }
                Err(e) => record_failure(&mut report.failures, &org.id, "list_members", &e),
            }
        }

        for (org, members) in &rosters {
            let mut listed: HashSet<String> = HashSet::new();
            let mut fixes = Vec::new();

            for member in members {
                let Some(email) = member.email().and_then(normalize_email) else {
                    warn!(
                        shop_id = %org.id,
                        clerk_user_id = %member.public_user_data.user_id,
                        "Provider member without email, cannot compare"
                    );
                    continue;
                };
                listed.insert(email.clone());

                match users_by_email.get(&email) {
                    None => {
                        report.missing_members.push(MissingMember {
                            shop_id: org.id.clone(),
                            clerk_user_id: member.public_user_data.user_id.clone(),
                            email,
                            role: member.role.clone(),
                        });
                        fixes.push(MemberFix::CreateAndLink {
                            clerk_user_id: member.public_user_data.user_id.clone(),
                            role: member.role.clone(),
                        });
                    }
                    Some(user) => {
                        if membership_consistent(user, &org.id, &member.role, member_orgs.get(&email))
                        {
                            continue;
                        }
                        report.role_mismatches.push(RoleMismatch {
                            shop_id: org.id.clone(),
                            email: email.clone(),
                            expected_role: member.role.clone(),
                            actual_role: user.role.clone(),
                            actual_shop_id: user.shop_id.clone(),
                        });
                        fixes.push(MemberFix::Link {
                            email,
                            role: member.role.clone(),
                        });
                    }
                }
            }

            for user in users_by_email.values() {
                if user.shop_id.as_deref() == Some(org.id.as_str()) && !listed.contains(&user.email)
                {
                    report.stale_members.push(StaleMember {
                        shop_id: org.id.clone(),
                        email: user.email.clone(),
                    });
                }
            }

            if options.fix_roles && !fixes.is_empty() {
                match self.apply_member_fixes(&org.id, fixes).await {
                    Ok(applied) => {
                        report.repairs.users_upserted += applied.users_upserted;
                        report.repairs.memberships_fixed += applied.memberships_fixed;
                        for clerk_user_id in &applied.unresolved {
                            let err = AppError::NotFound(format!(
                                "User {} at identity provider",
                                clerk_user_id
                            ));
                            record_failure(&mut report.failures, &org.id, "fetch_user", &err);
                        }
                        for user in applied.users {
                            users_by_email.insert(user.email.clone(), user);
                        }
                    }
                    Err(e) => {
                        record_failure(&mut report.failures, &org.id, "fix_memberships", &e)
                    }
                }
            }
        }
        report
            .stale_members
            .sort_by(|a, b| (&a.shop_id, &a.email).cmp(&(&b.shop_id, &b.email)));

        // Users whose shop reference is dangling or empty.
        for user in db::users::list_all(conn).await? {
            match user.shop_id.as_deref() {
                Some(shop_id) if !local_by_id.contains_key(shop_id) => {
                    report.orphaned_users.push(user.email)
                }
                Some(_) => {}
                None => report.unassigned_users.push(user.email),
            }
        }

        if options.repair {
            for shop_id in &report.missing_settings {
                match self.backfill_settings(shop_id).await {
                    Ok(true) => report.repairs.settings_backfilled += 1,
                    Ok(false) => {}
                    Err(e) => record_failure(&mut report.failures, shop_id, "backfill_settings", &e),
                }
            }
        }

        info!(
            missing_shops = report.missing_shops.len(),
            orphaned_shops = report.orphaned_shops.len(),
            drifted_shops = report.drifted_shops.len(),
            missing_settings = report.missing_settings.len(),
            role_mismatches = report.role_mismatches.len(),
            missing_members = report.missing_members.len(),
            stale_members = report.stale_members.len(),
            orphaned_users = report.orphaned_users.len(),
            unassigned_users = report.unassigned_users.len(),
            failures = report.failures.len(),
            "Consistency audit finished"
        );

        Ok(report)
    }

    /// Delete local shops the provider no longer lists.
    ///
    /// Each candidate is re-checked against the provider first; shops it
    /// still lists are left alone.
    pub async fn prune_orphans(&self, shop_ids: &[String]) -> AppResult<PruneReport> {
        let remote_ids: HashSet<String> = self
            .provider
            .list_organizations()
            .await?
            .into_iter()
            .map(|org| org.id)
            .collect();

        let mut report = PruneReport::default();
        for shop_id in shop_ids {
            if remote_ids.contains(shop_id) {
                warn!(shop_id = %shop_id, "Shop is still listed by the identity provider, not pruning");
                report.still_active.push(shop_id.clone());
                continue;
            }

            match sync::delete_shop(self.pool.connection(), shop_id).await {
                Ok(true) => {
                    info!(shop_id = %shop_id, "Pruned orphaned shop");
                    report.pruned.push(shop_id.clone());
                }
                Ok(false) => report.not_found.push(shop_id.clone()),
                Err(e) => record_failure(&mut report.failures, shop_id, "delete_shop", &e),
            }
        }

        Ok(report)
    }

    async fn write_shop(&self, org: &OrganizationPayload) -> AppResult<ShopUpsert> {
        let billing = BillingMetadata::from_private_metadata(org.private_metadata.as_ref());

        let txn = self.pool.connection().begin().await?;
        let upsert =
            sync::upsert_shop(&txn, &org.id, &org.name, org.slug.as_deref(), billing.as_ref())
                .await?;
        txn.commit().await?;

        Ok(upsert)
    }

    async fn backfill_settings(&self, shop_id: &str) -> AppResult<bool> {
        let txn = self.pool.connection().begin().await?;
        if db::shops::has_settings(&txn, shop_id).await? {
            return Ok(false);
        }
        db::shops::insert_default_settings(&txn, shop_id).await?;
        txn.commit().await?;

        info!(shop_id = %shop_id, "Backfilled shop settings");
        Ok(true)
    }

    /// Apply one shop's membership fixes in a single transaction.
    async fn apply_member_fixes(
        &self,
        shop_id: &str,
        fixes: Vec<MemberFix>,
    ) -> AppResult<AppliedFixes> {
        let mut applied = AppliedFixes::default();

        // Provider lookups happen before the transaction opens.
        let mut resolved: Vec<(Option<UserPayload>, Option<String>, String)> = Vec::new();
        for fix in fixes {
            match fix {
                MemberFix::Link { email, role } => resolved.push((None, Some(email), role)),
                MemberFix::CreateAndLink {
                    clerk_user_id,
                    role,
                } => match self.provider.get_user(&clerk_user_id).await? {
                    Some(profile) => resolved.push((Some(profile), None, role)),
                    None => {
                        warn!(
                            shop_id = %shop_id,
                            clerk_user_id = %clerk_user_id,
                            "Listed member unknown to the identity provider, skipping"
                        );
                        applied.unresolved.push(clerk_user_id);
                    }
                },
            }
        }

        let txn = self.pool.connection().begin().await?;

        for (profile, email, role) in resolved {
            let email = match profile {
                Some(profile) => {
                    let upserted = sync::upsert_user(
                        &txn,
                        &profile.id,
                        profile.primary_email(),
                        profile.first_name.as_deref(),
                        profile.last_name.as_deref(),
                    )
                    .await?;
                    let Some(user) = upserted else {
                        continue;
                    };
                    applied.users_upserted += 1;
                    user.email
                }
                None => match email {
                    Some(email) => email,
                    None => continue,
                },
            };

            if let Some(user) = sync::upsert_membership(&txn, shop_id, Some(&email), &role).await? {
                applied.memberships_fixed += 1;
                applied.users.push(user);
            }
        }

        txn.commit().await?;
        Ok(applied)
    }
}

/// Whether a local user agrees with one provider membership.
///
/// A user listed by several organizations is consistent as long as its
/// current shop is one of them.
fn membership_consistent(
    user: &User,
    shop_id: &str,
    remote_role: &str,
    member_of: Option<&HashSet<String>>,
) -> bool {
    match user.shop_id.as_deref() {
        Some(current) if current == shop_id => {
            user.shop_role() == Some(ShopRole::from_raw(remote_role))
        }
        Some(current) => member_of.is_some_and(|orgs| orgs.contains(current)),
        None => false,
    }
}

fn record_failure(failures: &mut Vec<AuditFailure>, shop_id: &str, step: &str, err: &AppError) {
    error!(shop_id = %shop_id, step = %step, error = %err, "Audit step failed, continuing");
    failures.push(AuditFailure {
        shop_id: shop_id.to_string(),
        step: step.to_string(),
        error: err.to_string(),
    });
}

/// Start the scheduled report-only audit.
///
/// Spawns a tokio task that runs the auditor every `interval_secs` and logs
/// what it found. Nothing is repaired from the schedule.
pub fn start_audit_task(auditor: Arc<Auditor>, interval_secs: u64) {
    tokio::spawn(async move {
        info!("Starting scheduled audit (interval: {} seconds)", interval_secs);

        let mut ticker = interval(Duration::from_secs(interval_secs));

        loop {
            ticker.tick().await;

            match auditor.run(AuditOptions::report_only()).await {
                Ok(report) if report.is_clean() => debug!("Scheduled audit found no drift"),
                Ok(report) => warn!(
                    missing_shops = report.missing_shops.len(),
                    orphaned_shops = report.orphaned_shops.len(),
                    role_mismatches = report.role_mismatches.len(),
                    orphaned_users = report.orphaned_users.len(),
                    "Scheduled audit found drift"
                ),
                Err(e) => error!("Scheduled audit error: {}", e),
            }
        }
    });
}
