//! Domain models for the sync service.

pub mod audit;
pub mod shop;
pub mod user;
pub mod webhook_event;

// Re-export commonly used types
pub use audit::{
    AuditFailure, AuditOptions, AuditReport, MissingMember, PruneReport, RepairSummary,
    RoleMismatch, ShopDrift, StaleMember,
};
pub use shop::{BillingMetadata, Shop, ShopType};
pub use user::{ShopRole, User};
pub use webhook_event::{
    DeletedObject, MembershipPayload, OrganizationPayload, SyncEvent, UserPayload,
    WebhookEnvelope,
};
