//! Reconciliation engine.
//!
//! Applies identity provider changes to the local store. Every operation is
//! keyed by provider ids (plus email for users) and is idempotent, so
//! redelivered or reordered events converge on the same rows.
//!
//! The operations are free functions generic over the connection so the
//! auditor can run them inside its own per-shop transaction; [`SyncService`]
//! binds them to the pool for request handlers.

use sea_orm::{ConnectionTrait, TransactionSession, TransactionTrait};
use tracing::{debug, info, warn};

use crate::db::{self, DbPool};
use crate::error::AppResult;
use crate::models::shop::slugify;
use crate::models::user::{display_name, normalize_email};
use crate::models::{BillingMetadata, Shop, SyncEvent, User};

/// What dispatching an event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Rows were written.
    Applied,
    /// Nothing to do: the target was absent or the payload lacked data.
    Skipped,
}

/// Result of [`upsert_shop`].
#[derive(Debug, Clone)]
pub struct ShopUpsert {
    pub shop: Shop,
    pub created: bool,
    pub settings_backfilled: bool,
}

/// The slug a shop should carry: the provider's, else one derived from the
/// name, else the lower-cased id.
pub fn resolve_slug(id: &str, name: &str, slug: Option<&str>) -> String {
    match slug.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => slug.to_string(),
        None => {
            let derived = slugify(name);
            if derived.is_empty() { id.to_lowercase() } else { derived }
        }
    }
}

/// Create or update a user, joining on email first.
///
/// Returns `None` when the payload carries no usable email.
pub async fn upsert_user<C: ConnectionTrait>(
    db: &C,
    clerk_id: &str,
    email: Option<&str>,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> AppResult<Option<User>> {
    let Some(email) = email.and_then(normalize_email) else {
        warn!(clerk_id = %clerk_id, "User event without email address, skipping");
        return Ok(None);
    };
    let name = display_name(first_name, last_name);

    if let Some(existing) = db::users::find_by_email(db, &email).await? {
        let mut target_clerk_id = clerk_id;
        if existing.clerk_id != clerk_id {
            if let Some(holder) = db::users::find_by_clerk_id(db, clerk_id).await? {
                warn!(
                    clerk_id = %clerk_id,
                    email = %email,
                    holder_email = %holder.email,
                    "Provider id already belongs to another user, keeping existing id"
                );
                target_clerk_id = existing.clerk_id.as_str();
            } else {
                info!(
                    old_clerk_id = %existing.clerk_id,
                    clerk_id = %clerk_id,
                    "Re-keying user matched by email"
                );
            }
        }

        let user =
            db::users::update_profile(db, existing.id, target_clerk_id, &email, name.as_deref())
                .await?;
        return Ok(Some(user));
    }

    if let Some(existing) = db::users::find_by_clerk_id(db, clerk_id).await? {
        debug!(clerk_id = %clerk_id, "Updating user matched by provider id");
        let user =
            db::users::update_profile(db, existing.id, clerk_id, &email, name.as_deref()).await?;
        return Ok(Some(user));
    }

    let user = db::users::insert(db, clerk_id, &email, name.as_deref()).await?;
    info!(clerk_id = %clerk_id, user_id = %user.id, "Created user");
    Ok(Some(user))
}

/// Delete a user by provider id. Returns whether a row was removed.
pub async fn delete_user<C: ConnectionTrait>(db: &C, clerk_id: &str) -> AppResult<bool> {
    let removed = db::users::delete_by_clerk_id(db, clerk_id).await?;
    if removed == 0 {
        debug!(clerk_id = %clerk_id, "User already absent");
    } else {
        info!(clerk_id = %clerk_id, "Deleted user");
    }
    Ok(removed > 0)
}

/// Create a shop with its settings row, or update name, slug and billing.
///
/// New shops start without billing fields; billing is only written on update
/// and only when metadata was supplied. A missing slug is derived from the
/// name.
pub async fn upsert_shop<C: ConnectionTrait + TransactionTrait>(
    db: &C,
    id: &str,
    name: &str,
    slug: Option<&str>,
    billing: Option<&BillingMetadata>,
) -> AppResult<ShopUpsert> {
    let slug = resolve_slug(id, name, slug);

    if db::shops::find_by_id(db, id).await?.is_some() {
        let shop = db::shops::update_details(db, id, name, &slug, billing).await?;

        let settings_backfilled = if db::shops::has_settings(db, id).await? {
            false
        } else {
            warn!(shop_id = %id, "Shop had no settings row, backfilling defaults");
            db::shops::insert_default_settings(db, id).await?;
            true
        };

        debug!(shop_id = %id, "Updated shop");
        return Ok(ShopUpsert {
            shop,
            created: false,
            settings_backfilled,
        });
    }

    let txn = db.begin().await?;
    let shop = db::shops::insert(&txn, id, name, &slug).await?;
    db::shops::insert_default_settings(&txn, id).await?;
    txn.commit().await?;

    info!(shop_id = %id, slug = %shop.slug, "Created shop");
    Ok(ShopUpsert {
        shop,
        created: true,
        settings_backfilled: false,
    })
}

/// Delete a shop and everything it owns in one transaction.
///
/// Users pointing at the shop keep their row but lose shop and role.
/// Returns whether the shop existed.
pub async fn delete_shop<C: TransactionTrait>(db: &C, id: &str) -> AppResult<bool> {
    let txn = db.begin().await?;

    let detached = db::users::clear_shop_memberships(&txn, id).await?;
    let Some(counts) = db::shops::delete_cascade(&txn, id).await? else {
        txn.rollback().await?;
        debug!(shop_id = %id, "Shop already absent");
        return Ok(false);
    };

    txn.commit().await?;
    info!(
        shop_id = %id,
        users_detached = detached,
        ?counts,
        "Deleted shop and owned records"
    );
    Ok(true)
}

/// Link a user to a shop with the provider's raw role.
///
/// Never creates a shop or a user; returns `None` when either is unknown.
pub async fn upsert_membership<C: ConnectionTrait>(
    db: &C,
    shop_id: &str,
    email: Option<&str>,
    role: &str,
) -> AppResult<Option<User>> {
    let Some(email) = email.and_then(normalize_email) else {
        warn!(shop_id = %shop_id, "Membership event without member email, skipping");
        return Ok(None);
    };

    if db::shops::find_by_id(db, shop_id).await?.is_none() {
        warn!(shop_id = %shop_id, email = %email, "Membership for unknown shop, skipping");
        return Ok(None);
    }

    let Some(user) = db::users::find_by_email(db, &email).await? else {
        warn!(shop_id = %shop_id, email = %email, "Membership for unknown user, skipping");
        return Ok(None);
    };

    let user = db::users::set_membership(db, user.id, Some(shop_id), Some(role)).await?;
    info!(shop_id = %shop_id, user_id = %user.id, role = %role, "Linked user to shop");
    Ok(Some(user))
}

/// Unlink a user from a shop if it currently points there.
pub async fn delete_membership<C: ConnectionTrait>(
    db: &C,
    shop_id: &str,
    email: Option<&str>,
) -> AppResult<Option<User>> {
    let Some(email) = email.and_then(normalize_email) else {
        warn!(shop_id = %shop_id, "Membership removal without member email, skipping");
        return Ok(None);
    };

    let Some(user) = db::users::find_by_email(db, &email).await? else {
        debug!(shop_id = %shop_id, email = %email, "Membership removal for unknown user");
        return Ok(None);
    };

    if user.shop_id.as_deref() != Some(shop_id) {
        debug!(
            shop_id = %shop_id,
            user_id = %user.id,
            current_shop = ?user.shop_id,
            "User not linked to this shop, nothing to remove"
        );
        return Ok(None);
    }

    let user = db::users::set_membership(db, user.id, None, None).await?;
    info!(shop_id = %shop_id, user_id = %user.id, "Unlinked user from shop");
    Ok(Some(user))
}

/// Reconciliation engine bound to the connection pool.
#[derive(Clone)]
pub struct SyncService {
    pool: DbPool,
}

impl SyncService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn upsert_user(
        &self,
        clerk_id: &str,
        email: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> AppResult<Option<User>> {
        upsert_user(self.pool.connection(), clerk_id, email, first_name, last_name).await
    }

    pub async fn delete_user(&self, clerk_id: &str) -> AppResult<bool> {
        delete_user(self.pool.connection(), clerk_id).await
    }

    pub async fn upsert_shop(
        &self,
        id: &str,
        name: &str,
        slug: Option<&str>,
        billing: Option<&BillingMetadata>,
    ) -> AppResult<ShopUpsert> {
        upsert_shop(self.pool.connection(), id, name, slug, billing).await
    }

    pub async fn delete_shop(&self, id: &str) -> AppResult<bool> {
        delete_shop(self.pool.connection(), id).await
    }

    pub async fn upsert_membership(
        &self,
        shop_id: &str,
        email: Option<&str>,
        role: &str,
    ) -> AppResult<Option<User>> {
        upsert_membership(self.pool.connection(), shop_id, email, role).await
    }

    pub async fn delete_membership(
        &self,
        shop_id: &str,
        email: Option<&str>,
    ) -> AppResult<Option<User>> {
        delete_membership(self.pool.connection(), shop_id, email).await
    }

    /// Dispatch a recognized event to the matching operation.
    pub async fn apply(&self, event: SyncEvent) -> AppResult<SyncOutcome> {
        let applied = match event {
            SyncEvent::UserUpserted(user) => self
                .upsert_user(
                    &user.id,
                    user.primary_email(),
                    user.first_name.as_deref(),
                    user.last_name.as_deref(),
                )
                .await?
                .is_some(),
            SyncEvent::UserDeleted(deleted) => match deleted.id.as_deref() {
                Some(id) => self.delete_user(id).await?,
                None => {
                    warn!("user.deleted without id, skipping");
                    false
                }
            },
            SyncEvent::OrganizationUpserted(org) => {
                let billing = BillingMetadata::from_private_metadata(org.private_metadata.as_ref());
                self.upsert_shop(&org.id, &org.name, org.slug.as_deref(), billing.as_ref())
                    .await?;
                true
            }
            SyncEvent::OrganizationDeleted(deleted) => match deleted.id.as_deref() {
                Some(id) => self.delete_shop(id).await?,
                None => {
                    warn!("organization.deleted without id, skipping");
                    false
                }
            },
            SyncEvent::MembershipUpserted(membership) => self
                .upsert_membership(
                    &membership.organization.id,
                    membership.email(),
                    &membership.role,
                )
                .await?
                .is_some(),
            SyncEvent::MembershipDeleted(membership) => self
                .delete_membership(&membership.organization.id, membership.email())
                .await?
                .is_some(),
        };

        Ok(if applied {
            SyncOutcome::Applied
        } else {
            SyncOutcome::Skipped
        })
    }
}
