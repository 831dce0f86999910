//! Consistency audit options and report.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// What an audit run is allowed to change.
#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditOptions {
    /// Create missing shops, correct name/slug drift, backfill settings
    #[serde(default)]
    pub repair: bool,
    /// Apply provider memberships to users whose shop or role drifted
    #[serde(default)]
    pub fix_roles: bool,
}

impl AuditOptions {
    pub fn report_only() -> Self {
        Self::default()
    }
}

/// Name or slug difference between provider and store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ShopDrift {
    pub shop_id: String,
    pub local_name: String,
    pub remote_name: String,
    pub local_slug: String,
    pub remote_slug: String,
}

/// A provider member whose local shop link or role does not match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RoleMismatch {
    pub shop_id: String,
    pub email: String,
    pub expected_role: String,
    pub actual_role: Option<String>,
    pub actual_shop_id: Option<String>,
}

/// A provider member with no local user row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MissingMember {
    pub shop_id: String,
    pub clerk_user_id: String,
    pub email: String,
    pub role: String,
}

/// A local user linked to a shop whose provider membership list omits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StaleMember {
    pub shop_id: String,
    pub email: String,
}

/// A shop whose repair failed; the run continued without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AuditFailure {
    pub shop_id: String,
    pub step: String,
    pub error: String,
}

/// Writes performed by a repairing run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RepairSummary {
    pub shops_created: usize,
    pub shops_updated: usize,
    pub settings_backfilled: usize,
    /// Users written from provider profiles before linking
    pub users_upserted: usize,
    pub memberships_fixed: usize,
}

/// Result of one audit run.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct AuditReport {
    /// Organizations known to the provider with no local shop
    pub missing_shops: Vec<String>,
    /// Local shops the provider does not list; never removed automatically
    pub orphaned_shops: Vec<String>,
    pub drifted_shops: Vec<ShopDrift>,
    /// Shops without a settings row
    pub missing_settings: Vec<String>,
    pub role_mismatches: Vec<RoleMismatch>,
    pub missing_members: Vec<MissingMember>,
    pub stale_members: Vec<StaleMember>,
    /// Emails of users pointing at a shop that does not exist
    pub orphaned_users: Vec<String>,
    /// Emails of users with no shop
    pub unassigned_users: Vec<String>,
    pub repairs: RepairSummary,
    pub failures: Vec<AuditFailure>,
}

/// Result of an explicit orphan prune.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct PruneReport {
    /// Shops deleted with everything they owned
    pub pruned: Vec<String>,
    /// Candidates the provider still lists; left untouched
    pub still_active: Vec<String>,
    /// Candidates that no longer exist locally
    pub not_found: Vec<String>,
    pub failures: Vec<AuditFailure>,
}

impl AuditReport {
    /// True when the run found nothing that needs attention.
    pub fn is_clean(&self) -> bool {
        self.missing_shops.is_empty()
            && self.orphaned_shops.is_empty()
            && self.drifted_shops.is_empty()
            && self.missing_settings.is_empty()
            && self.role_mismatches.is_empty()
            && self.missing_members.is_empty()
            && self.stale_members.is_empty()
            && self.orphaned_users.is_empty()
            && self.failures.is_empty()
    }
}
