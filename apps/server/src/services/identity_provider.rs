//! Read-only client for the identity provider's backend API.
//!
//! The auditor consumes the provider through the [`IdentityProvider`] trait so
//! tests can substitute an in-memory directory.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::IdentitySettings;
use crate::error::{AppError, AppResult};
use crate::models::{MembershipPayload, OrganizationPayload, UserPayload};

/// Page size for list endpoints.
const PAGE_LIMIT: usize = 100;

/// HTTP connect timeout for provider calls.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP total timeout for provider calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Read operations the sync core needs from the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Every organization known to the provider.
    async fn list_organizations(&self) -> AppResult<Vec<OrganizationPayload>>;

    /// Every membership of one organization.
    async fn list_organization_members(&self, org_id: &str) -> AppResult<Vec<MembershipPayload>>;

    /// A single user, or `None` if the provider no longer knows it.
    async fn get_user(&self, user_id: &str) -> AppResult<Option<UserPayload>>;
}

/// Paginated list response.
#[derive(Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
    total_count: Option<usize>,
}

/// HTTP client for the Clerk backend API.
pub struct ClerkClient {
    api_url: String,
    secret_key: SecretString,
    http_client: reqwest::Client,
}

impl ClerkClient {
    /// Create a client from settings. Fails when no secret key is configured.
    pub fn new(settings: &IdentitySettings) -> AppResult<Self> {
        let secret_key = settings.secret_key.clone().ok_or_else(|| {
            AppError::NotConfigured("CLERK_SECRET_KEY is required to query the identity provider".to_string())
        })?;

        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::IdentityProvider(format!("Failed to build HTTP client: {}", e)))?;

        let api_url = settings.api_url.trim_end_matches('/').to_string();
        info!("Identity provider client initialized (api_url={})", api_url);

        Ok(Self {
            api_url,
            secret_key,
            http_client,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AppResult<Option<T>> {
        let url = format!("{}{}", self.api_url, path);
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response.error_for_status()?;
        Ok(Some(response.json::<T>().await?))
    }

    /// Walk a paginated list endpoint until a short page is returned.
    async fn list_all<T: DeserializeOwned>(&self, path: &str) -> AppResult<Vec<T>> {
        let mut items = Vec::new();
        let mut offset = 0;

        loop {
            let page_path = format!("{}?limit={}&offset={}", path, PAGE_LIMIT, offset);
            let page: ListResponse<T> = self
                .get_json(&page_path)
                .await?
                .ok_or_else(|| AppError::IdentityProvider(format!("{} returned 404", path)))?;

            let fetched = page.data.len();
            items.extend(page.data);
            offset += fetched;

            let exhausted = page.total_count.is_some_and(|total| offset >= total);
            if fetched < PAGE_LIMIT || exhausted {
                break;
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl IdentityProvider for ClerkClient {
    async fn list_organizations(&self) -> AppResult<Vec<OrganizationPayload>> {
        self.list_all("/organizations").await
    }

    async fn list_organization_members(&self, org_id: &str) -> AppResult<Vec<MembershipPayload>> {
        let path = format!("/organizations/{}/memberships", urlencoding::encode(org_id));
        self.list_all(&path).await
    }

    async fn get_user(&self, user_id: &str) -> AppResult<Option<UserPayload>> {
        let path = format!("/users/{}", urlencoding::encode(user_id));
        self.get_json(&path).await
    }
}
