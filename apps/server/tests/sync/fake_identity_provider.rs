//! In-memory identity provider for auditor tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use cardshop_sync_lib::error::{AppError, AppResult};
use cardshop_sync_lib::models::webhook_event::{EmailAddress, OrganizationRef, PublicUserData};
use cardshop_sync_lib::models::{MembershipPayload, OrganizationPayload, UserPayload};
use cardshop_sync_lib::services::IdentityProvider;

/// Organizations, memberships and users held in memory.
#[derive(Default)]
pub struct FakeIdentityProvider {
    orgs: Mutex<Vec<OrganizationPayload>>,
    members: Mutex<HashMap<String, Vec<MembershipPayload>>>,
    users: Mutex<HashMap<String, UserPayload>>,
    failing_member_lists: Mutex<HashSet<String>>,
}

impl FakeIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_org(&self, id: &str, name: &str, slug: &str) {
        self.orgs.lock().unwrap().push(OrganizationPayload {
            id: id.to_string(),
            name: name.to_string(),
            slug: Some(slug.to_string()),
            private_metadata: None,
        });
    }

    pub fn remove_org(&self, id: &str) {
        self.orgs.lock().unwrap().retain(|org| org.id != id);
    }

    pub fn add_user(&self, user_id: &str, email: &str, first_name: Option<&str>) {
        self.users.lock().unwrap().insert(
            user_id.to_string(),
            UserPayload {
                id: user_id.to_string(),
                email_addresses: vec![EmailAddress {
                    id: Some(format!("idn_{}", user_id)),
                    email_address: email.to_string(),
                }],
                primary_email_address_id: Some(format!("idn_{}", user_id)),
                first_name: first_name.map(str::to_string),
                last_name: None,
            },
        );
    }

    pub fn add_member(&self, org_id: &str, user_id: &str, email: &str, role: &str) {
        self.members
            .lock()
            .unwrap()
            .entry(org_id.to_string())
            .or_default()
            .push(MembershipPayload {
                role: role.to_string(),
                organization: OrganizationRef {
                    id: org_id.to_string(),
                },
                public_user_data: PublicUserData {
                    user_id: user_id.to_string(),
                    identifier: Some(email.to_string()),
                    first_name: None,
                    last_name: None,
                },
            });
    }

    /// Make member listing for one organization fail.
    pub fn fail_members_for(&self, org_id: &str) {
        self.failing_member_lists
            .lock()
            .unwrap()
            .insert(org_id.to_string());
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn list_organizations(&self) -> AppResult<Vec<OrganizationPayload>> {
        Ok(self.orgs.lock().unwrap().clone())
    }

    async fn list_organization_members(&self, org_id: &str) -> AppResult<Vec<MembershipPayload>> {
        if self.failing_member_lists.lock().unwrap().contains(org_id) {
            return Err(AppError::IdentityProvider(format!(
                "membership listing for {} timed out",
                org_id
            )));
        }
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(org_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_user(&self, user_id: &str) -> AppResult<Option<UserPayload>> {
        Ok(self.users.lock().unwrap().get(user_id).cloned())
    }
}
