//! Identity provider event envelope and payloads.
//!
//! The same payload shapes are returned by the provider's backend API, so the
//! identity provider client deserializes into these types as well.

use serde::Deserialize;
use serde_json::Value;

/// Event envelope as delivered to the webhook endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Value,
}

/// An email address attached to a provider user.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailAddress {
    pub id: Option<String>,
    pub email_address: String,
}

/// Provider user (`user.created`, `user.updated`, `GET /users/{id}`).
#[derive(Debug, Clone, Deserialize)]
pub struct UserPayload {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    pub primary_email_address_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserPayload {
    /// The primary email address, falling back to the first one listed.
    pub fn primary_email(&self) -> Option<&str> {
        let primary = self.primary_email_address_id.as_deref().and_then(|primary_id| {
            self.email_addresses
                .iter()
                .find(|address| address.id.as_deref() == Some(primary_id))
        });

        primary
            .or_else(|| self.email_addresses.first())
            .map(|address| address.email_address.as_str())
    }
}

/// Tombstone sent for `*.deleted` events.
#[derive(Debug, Clone, Deserialize)]
pub struct DeletedObject {
    pub id: Option<String>,
}

/// Provider organization (`organization.created`, `organization.updated`,
/// `GET /organizations`).
#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationPayload {
    pub id: String,
    pub name: String,
    pub slug: Option<String>,
    pub private_metadata: Option<Value>,
}

/// Organization reference embedded in a membership.
#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationRef {
    pub id: String,
}

/// Public profile of the member embedded in a membership.
#[derive(Debug, Clone, Deserialize)]
pub struct PublicUserData {
    pub user_id: String,
    /// The member's email address
    pub identifier: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Organization membership (`organizationMembership.*`,
/// `GET /organizations/{id}/memberships`).
#[derive(Debug, Clone, Deserialize)]
pub struct MembershipPayload {
    pub role: String,
    pub organization: OrganizationRef,
    pub public_user_data: PublicUserData,
}

impl MembershipPayload {
    pub fn email(&self) -> Option<&str> {
        self.public_user_data.identifier.as_deref()
    }
}

/// A recognized event, ready for the reconciliation engine.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    UserUpserted(UserPayload),
    UserDeleted(DeletedObject),
    OrganizationUpserted(OrganizationPayload),
    OrganizationDeleted(DeletedObject),
    MembershipUpserted(MembershipPayload),
    MembershipDeleted(MembershipPayload),
}

impl SyncEvent {
    /// Interpret an envelope.
    ///
    /// Returns `Ok(None)` for event types this service does not consume, and
    /// an error when a consumed type carries data of the wrong shape.
    pub fn from_envelope(envelope: WebhookEnvelope) -> Result<Option<Self>, serde_json::Error> {
        let data = envelope.data;
        let event = match envelope.event_type.as_str() {
            "user.created" | "user.updated" => Self::UserUpserted(serde_json::from_value(data)?),
            "user.deleted" => Self::UserDeleted(serde_json::from_value(data)?),
            "organization.created" | "organization.updated" => {
                Self::OrganizationUpserted(serde_json::from_value(data)?)
            }
            "organization.deleted" => Self::OrganizationDeleted(serde_json::from_value(data)?),
            "organizationMembership.created" | "organizationMembership.updated" => {
                Self::MembershipUpserted(serde_json::from_value(data)?)
            }
            "organizationMembership.deleted" => {
                Self::MembershipDeleted(serde_json::from_value(data)?)
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}
