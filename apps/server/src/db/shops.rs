//! Database operations for shops, their settings, and the records they own.

use chrono::Utc;
use sea_orm::*;
use tracing::debug;
use uuid::Uuid;

use crate::entity::{
    buylist, buylist_item, credit_transaction, customer, inventory_item, product, shop,
    shop_settings, transaction, transaction_item,
};
use crate::error::AppResult;
use crate::models::shop::settings_defaults;
use crate::models::{BillingMetadata, Shop, ShopType};

/// Row counts removed by a cascading shop delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeCounts {
    pub credit_transactions: u64,
    pub transaction_items: u64,
    pub transactions: u64,
    pub buylist_items: u64,
    pub buylists: u64,
    pub inventory_items: u64,
    pub products: u64,
    pub customers: u64,
    pub settings: u64,
}

/// Find a shop by its organization id.
pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: &str) -> AppResult<Option<Shop>> {
    let result = shop::Entity::find_by_id(id.to_string()).one(db).await?;
    Ok(result.map(model_to_shop))
}

/// List all shops.
pub async fn list_all<C: ConnectionTrait>(db: &C) -> AppResult<Vec<Shop>> {
    let results = shop::Entity::find()
        .order_by_asc(shop::Column::Id)
        .all(db)
        .await?;

    Ok(results.into_iter().map(model_to_shop).collect())
}

/// Insert a shop with the default type and no billing fields.
pub async fn insert<C: ConnectionTrait>(
    db: &C,
    id: &str,
    name: &str,
    slug: &str,
) -> AppResult<Shop> {
    let now = Utc::now();

    let model = shop::ActiveModel {
        id: Set(id.to_string()),
        name: Set(name.to_string()),
        slug: Set(slug.to_string()),
        shop_type: Set(ShopType::default().as_str().to_string()),
        plan_id: Set(None),
        plan_status: Set(None),
        subscription_id: Set(None),
        trial_ends_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let inserted = model.insert(db).await?;
    Ok(model_to_shop(inserted))
}

/// Update name and slug, and billing fields when metadata was supplied.
pub async fn update_details<C: ConnectionTrait>(
    db: &C,
    id: &str,
    name: &str,
    slug: &str,
    billing: Option<&BillingMetadata>,
) -> AppResult<Shop> {
    let mut active = shop::ActiveModel {
        id: Unchanged(id.to_string()),
        name: Set(name.to_string()),
        slug: Set(slug.to_string()),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };

    if let Some(billing) = billing {
        active.plan_id = Set(Some(billing.plan_id.clone()));
        active.plan_status = Set(Some(billing.plan_status.clone()));
        active.subscription_id = Set(billing.subscription_id.clone());
        active.trial_ends_at = Set(billing.trial_ends_at);
    }

    let updated = active.update(db).await?;
    Ok(model_to_shop(updated))
}

/// Insert the settings row for a shop with the fixed defaults.
pub async fn insert_default_settings<C: ConnectionTrait>(db: &C, shop_id: &str) -> AppResult<()> {
    let now = Utc::now();

    let model = shop_settings::ActiveModel {
        shop_id: Set(shop_id.to_string()),
        default_currency: Set(settings_defaults::DEFAULT_CURRENCY.to_string()),
        email_notifications: Set(settings_defaults::EMAIL_NOTIFICATIONS),
        low_stock_alerts: Set(settings_defaults::LOW_STOCK_ALERTS),
        auto_price_sync: Set(settings_defaults::AUTO_PRICE_SYNC),
        low_stock_threshold: Set(settings_defaults::LOW_STOCK_THRESHOLD),
        store_credit_enabled: Set(settings_defaults::STORE_CREDIT_ENABLED),
        min_credit_amount: Set(settings_defaults::MIN_CREDIT_AMOUNT),
        max_credit_amount: Set(settings_defaults::MAX_CREDIT_AMOUNT),
        created_at: Set(now),
        updated_at: Set(now),
    };

    shop_settings::Entity::insert(model).exec(db).await?;
    Ok(())
}

/// Whether a shop has its settings row.
pub async fn has_settings<C: ConnectionTrait>(db: &C, shop_id: &str) -> AppResult<bool> {
    let found = shop_settings::Entity::find_by_id(shop_id.to_string())
        .one(db)
        .await?;
    Ok(found.is_some())
}

/// Ids of all shops that have a settings row.
pub async fn list_settings_shop_ids<C: ConnectionTrait>(db: &C) -> AppResult<Vec<String>> {
    let ids: Vec<String> = shop_settings::Entity::find()
        .select_only()
        .column(shop_settings::Column::ShopId)
        .into_tuple()
        .all(db)
        .await?;
    Ok(ids)
}

/// Delete a shop and everything it owns, children before parents.
///
/// Must run inside a transaction; the caller commits. Returns `None` when the
/// shop does not exist.
pub async fn delete_cascade<C: ConnectionTrait>(
    db: &C,
    shop_id: &str,
) -> AppResult<Option<CascadeCounts>> {
    if shop::Entity::find_by_id(shop_id.to_string())
        .one(db)
        .await?
        .is_none()
    {
        return Ok(None);
    }

    let mut counts = CascadeCounts::default();

    counts.credit_transactions = credit_transaction::Entity::delete_many()
        .filter(credit_transaction::Column::ShopId.eq(shop_id))
        .exec(db)
        .await?
        .rows_affected;

    let transaction_ids: Vec<Uuid> = transaction::Entity::find()
        .select_only()
        .column(transaction::Column::Id)
        .filter(transaction::Column::ShopId.eq(shop_id))
        .into_tuple()
        .all(db)
        .await?;
    if !transaction_ids.is_empty() {
        counts.transaction_items = transaction_item::Entity::delete_many()
            .filter(transaction_item::Column::TransactionId.is_in(transaction_ids))
            .exec(db)
            .await?
            .rows_affected;
    }

    counts.transactions = transaction::Entity::delete_many()
        .filter(transaction::Column::ShopId.eq(shop_id))
        .exec(db)
        .await?
        .rows_affected;

    let buylist_ids: Vec<Uuid> = buylist::Entity::find()
        .select_only()
        .column(buylist::Column::Id)
        .filter(buylist::Column::ShopId.eq(shop_id))
        .into_tuple()
        .all(db)
        .await?;
    if !buylist_ids.is_empty() {
        counts.buylist_items = buylist_item::Entity::delete_many()
            .filter(buylist_item::Column::BuylistId.is_in(buylist_ids))
            .exec(db)
            .await?
            .rows_affected;
    }

    counts.buylists = buylist::Entity::delete_many()
        .filter(buylist::Column::ShopId.eq(shop_id))
        .exec(db)
        .await?
        .rows_affected;

    counts.inventory_items = inventory_item::Entity::delete_many()
        .filter(inventory_item::Column::ShopId.eq(shop_id))
        .exec(db)
        .await?
        .rows_affected;

    counts.products = product::Entity::delete_many()
        .filter(product::Column::ShopId.eq(shop_id))
        .exec(db)
        .await?
        .rows_affected;

    counts.customers = customer::Entity::delete_many()
        .filter(customer::Column::ShopId.eq(shop_id))
        .exec(db)
        .await?
        .rows_affected;

    counts.settings = shop_settings::Entity::delete_many()
        .filter(shop_settings::Column::ShopId.eq(shop_id))
        .exec(db)
        .await?
        .rows_affected;

    shop::Entity::delete_by_id(shop_id.to_string())
        .exec(db)
        .await?;

    debug!(shop_id = %shop_id, ?counts, "Cascade delete staged");
    Ok(Some(counts))
}

fn model_to_shop(m: shop::Model) -> Shop {
    Shop {
        shop_type: ShopType::parse(&m.shop_type).unwrap_or_default(),
        id: m.id,
        name: m.name,
        slug: m.slug,
        plan_id: m.plan_id,
        plan_status: m.plan_status,
        subscription_id: m.subscription_id,
        trial_ends_at: m.trial_ends_at,
        created_at: m.created_at,
        updated_at: m.updated_at,
    }
}
