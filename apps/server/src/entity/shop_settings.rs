//! Per-shop settings, 1:1 with `shops`.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "shop_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub shop_id: String,
    pub default_currency: String,
    pub email_notifications: bool,
    pub low_stock_alerts: bool,
    pub auto_price_sync: bool,
    pub low_stock_threshold: i32,
    pub store_credit_enabled: bool,
    pub min_credit_amount: f64,
    pub max_credit_amount: f64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
