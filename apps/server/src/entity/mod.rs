//! SeaORM entity definitions for PostgreSQL database.

pub mod buylist;
pub mod buylist_item;
pub mod credit_transaction;
pub mod customer;
pub mod inventory_item;
pub mod product;
pub mod shop;
pub mod shop_settings;
pub mod transaction;
pub mod transaction_item;
pub mod user;
