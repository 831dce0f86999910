//! Create the shop-owned record tables.
//!
//! Foreign keys have no ON DELETE action: removing a shop deletes children
//! explicitly, leaf tables first.

use sea_orm_migration::prelude::*;

use super::m20260301_000001_create_shops::Shop;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Customer::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Customer::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Customer::ShopId).string_len(64).not_null())
                    .col(ColumnDef::new(Customer::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Customer::Email).string_len(255))
                    .col(
                        ColumnDef::new(Customer::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Customer::Table, Customer::ShopId)
                            .to(Shop::Table, Shop::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Product::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Product::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Product::ShopId).string_len(64).not_null())
                    .col(ColumnDef::new(Product::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Product::SetName).string_len(255))
                    .col(
                        ColumnDef::new(Product::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Product::Table, Product::ShopId)
                            .to(Shop::Table, Shop::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(InventoryItem::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InventoryItem::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(InventoryItem::ShopId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(InventoryItem::ProductId).uuid().not_null())
                    .col(
                        ColumnDef::new(InventoryItem::Quantity)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(InventoryItem::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(InventoryItem::Table, InventoryItem::ShopId)
                            .to(Shop::Table, Shop::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(InventoryItem::Table, InventoryItem::ProductId)
                            .to(Product::Table, Product::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Transaction::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transaction::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transaction::ShopId).string_len(64).not_null())
                    .col(ColumnDef::new(Transaction::CustomerId).uuid())
                    .col(
                        ColumnDef::new(Transaction::TotalCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Transaction::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Transaction::Table, Transaction::ShopId)
                            .to(Shop::Table, Shop::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Transaction::Table, Transaction::CustomerId)
                            .to(Customer::Table, Customer::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TransactionItem::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TransactionItem::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TransactionItem::TransactionId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TransactionItem::ProductId).uuid())
                    .col(
                        ColumnDef::new(TransactionItem::Quantity)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(TransactionItem::UnitPriceCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(TransactionItem::Table, TransactionItem::TransactionId)
                            .to(Transaction::Table, Transaction::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(TransactionItem::Table, TransactionItem::ProductId)
                            .to(Product::Table, Product::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Buylist::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Buylist::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Buylist::ShopId).string_len(64).not_null())
                    .col(ColumnDef::new(Buylist::CustomerId).uuid())
                    .col(
                        ColumnDef::new(Buylist::Status)
                            .string_len(20)
                            .not_null()
                            .default("open"),
                    )
                    .col(
                        ColumnDef::new(Buylist::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Buylist::Table, Buylist::ShopId)
                            .to(Shop::Table, Shop::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Buylist::Table, Buylist::CustomerId)
                            .to(Customer::Table, Customer::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BuylistItem::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BuylistItem::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BuylistItem::BuylistId).uuid().not_null())
                    .col(ColumnDef::new(BuylistItem::ProductId).uuid())
                    .col(
                        ColumnDef::new(BuylistItem::Quantity)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(BuylistItem::OfferCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(BuylistItem::Table, BuylistItem::BuylistId)
                            .to(Buylist::Table, Buylist::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(BuylistItem::Table, BuylistItem::ProductId)
                            .to(Product::Table, Product::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CreditTransaction::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CreditTransaction::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CreditTransaction::ShopId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CreditTransaction::CustomerId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CreditTransaction::AmountCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CreditTransaction::Reason).string_len(255))
                    .col(
                        ColumnDef::new(CreditTransaction::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(CreditTransaction::Table, CreditTransaction::ShopId)
                            .to(Shop::Table, Shop::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(CreditTransaction::Table, CreditTransaction::CustomerId)
                            .to(Customer::Table, Customer::Id),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Reverse dependency order.
        manager
            .drop_table(Table::drop().table(CreditTransaction::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TransactionItem::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transaction::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BuylistItem::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Buylist::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(InventoryItem::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Product::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Customer::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Customer {
    #[sea_orm(iden = "customers")]
    Table,
    Id,
    ShopId,
    Name,
    Email,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Product {
    #[sea_orm(iden = "products")]
    Table,
    Id,
    ShopId,
    Name,
    SetName,
    CreatedAt,
}

#[derive(DeriveIden)]
enum InventoryItem {
    #[sea_orm(iden = "inventory_items")]
    Table,
    Id,
    ShopId,
    ProductId,
    Quantity,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Transaction {
    #[sea_orm(iden = "transactions")]
    Table,
    Id,
    ShopId,
    CustomerId,
    TotalCents,
    CreatedAt,
}

#[derive(DeriveIden)]
enum TransactionItem {
    #[sea_orm(iden = "transaction_items")]
    Table,
    Id,
    TransactionId,
    ProductId,
    Quantity,
    UnitPriceCents,
}

#[derive(DeriveIden)]
enum Buylist {
    #[sea_orm(iden = "buylists")]
    Table,
    Id,
    ShopId,
    CustomerId,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum BuylistItem {
    #[sea_orm(iden = "buylist_items")]
    Table,
    Id,
    BuylistId,
    ProductId,
    Quantity,
    OfferCents,
}

#[derive(DeriveIden)]
enum CreditTransaction {
    #[sea_orm(iden = "credit_transactions")]
    Table,
    Id,
    ShopId,
    CustomerId,
    AmountCents,
    Reason,
    CreatedAt,
}
