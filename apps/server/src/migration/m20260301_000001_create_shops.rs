//! Create shops and shop_settings tables.
//!
//! `shops.id` is the identity provider's organization id, not a generated key.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Shop::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Shop::Id).string_len(64).not_null().primary_key())
                    .col(ColumnDef::new(Shop::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Shop::Slug).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Shop::ShopType)
                            .string_len(20)
                            .not_null()
                            .default("tcg"),
                    )
                    .col(ColumnDef::new(Shop::PlanId).string_len(64))
                    .col(ColumnDef::new(Shop::PlanStatus).string_len(32))
                    .col(ColumnDef::new(Shop::SubscriptionId).string_len(255))
                    .col(ColumnDef::new(Shop::TrialEndsAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Shop::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Shop::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_shops_slug")
                    .table(Shop::Table)
                    .col(Shop::Slug)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ShopSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ShopSettings::ShopId)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ShopSettings::DefaultCurrency)
                            .string_len(3)
                            .not_null()
                            .default("USD"),
                    )
                    .col(
                        ColumnDef::new(ShopSettings::EmailNotifications)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ShopSettings::LowStockAlerts)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ShopSettings::AutoPriceSync)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ShopSettings::LowStockThreshold)
                            .integer()
                            .not_null()
                            .default(5),
                    )
                    .col(
                        ColumnDef::new(ShopSettings::StoreCreditEnabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ShopSettings::MinCreditAmount)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(ShopSettings::MaxCreditAmount)
                            .double()
                            .not_null()
                            .default(1000.0),
                    )
                    .col(
                        ColumnDef::new(ShopSettings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShopSettings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ShopSettings::Table, ShopSettings::ShopId)
                            .to(Shop::Table, Shop::Id),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ShopSettings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Shop::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Shop {
    #[sea_orm(iden = "shops")]
    Table,
    Id,
    Name,
    Slug,
    ShopType,
    PlanId,
    PlanStatus,
    SubscriptionId,
    TrialEndsAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ShopSettings {
    Table,
    ShopId,
    DefaultCurrency,
    EmailNotifications,
    LowStockAlerts,
    AutoPriceSync,
    LowStockThreshold,
    StoreCreditEnabled,
    MinCreditAmount,
    MaxCreditAmount,
    CreatedAt,
    UpdatedAt,
}
