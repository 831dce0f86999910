//! Card shop identity sync library.
//!
//! Keeps shops, users and memberships in the local database consistent with
//! the identity provider: signed webhook intake, the reconciliation engine,
//! and the consistency auditor.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod services;
