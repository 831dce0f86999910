//! SeaORM database migrations.

pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_shops;
mod m20260301_000002_create_users;
mod m20260301_000003_create_shop_records;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_shops::Migration),
            Box::new(m20260301_000002_create_users::Migration),
            Box::new(m20260301_000003_create_shop_records::Migration),
        ]
    }
}
