//! Business logic services.

pub mod auditor;
pub mod identity_provider;
pub mod sync;
pub mod webhook_verifier;

pub use auditor::{Auditor, start_audit_task};
pub use identity_provider::{ClerkClient, IdentityProvider};
pub use sync::{SyncOutcome, SyncService};
pub use webhook_verifier::{VerifyError, WebhookVerifier};
