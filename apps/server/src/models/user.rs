//! User and shop role models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// User stored in database.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    /// Identity provider user id
    pub clerk_id: String,
    pub email: String,
    pub name: Option<String>,
    /// Shop the user is a member of, if any
    pub shop_id: Option<String>,
    /// Raw role string exactly as the identity provider sent it
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Normalized view of the stored role.
    pub fn shop_role(&self) -> Option<ShopRole> {
        self.role.as_deref().map(ShopRole::from_raw)
    }
}

/// Normalized shop role.
///
/// The raw provider string stays on the user row; this is only computed for
/// comparisons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShopRole {
    Admin,
    Manager,
    Member,
    Other(String),
}

impl ShopRole {
    /// Normalize a provider role such as `org:admin` or `Member`.
    pub fn from_raw(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        let name = lowered.strip_prefix("org:").unwrap_or(&lowered);
        match name {
            "admin" | "owner" => Self::Admin,
            "manager" => Self::Manager,
            "member" | "basic_member" => Self::Member,
            _ => Self::Other(name.to_string()),
        }
    }
}

/// Lower-case and trim an email; `None` when nothing is left.
pub fn normalize_email(email: &str) -> Option<String> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Join first and last name into a display name.
pub fn display_name(first_name: Option<&str>, last_name: Option<&str>) -> Option<String> {
    let joined = [first_name, last_name]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if joined.is_empty() { None } else { Some(joined) }
}
