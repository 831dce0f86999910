//! Shop (tenant) models and billing metadata extraction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

/// Plan assigned when billing metadata is present but carries no plan.
pub const DEFAULT_PLAN_ID: &str = "starter";

/// Plan status assigned when billing metadata carries no status.
pub const DEFAULT_PLAN_STATUS: &str = "active";

/// Values for the settings row created alongside a new shop.
pub mod settings_defaults {
    pub const DEFAULT_CURRENCY: &str = "USD";
    pub const EMAIL_NOTIFICATIONS: bool = true;
    pub const LOW_STOCK_ALERTS: bool = true;
    pub const AUTO_PRICE_SYNC: bool = true;
    pub const LOW_STOCK_THRESHOLD: i32 = 5;
    pub const STORE_CREDIT_ENABLED: bool = true;
    pub const MIN_CREDIT_AMOUNT: f64 = 0.0;
    pub const MAX_CREDIT_AMOUNT: f64 = 1000.0;
}

/// Kind of shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ShopType {
    #[default]
    Tcg,
    Sports,
    Mixed,
}

impl ShopType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcg => "tcg",
            Self::Sports => "sports",
            Self::Mixed => "mixed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tcg" => Some(Self::Tcg),
            "sports" => Some(Self::Sports),
            "mixed" => Some(Self::Mixed),
            _ => None,
        }
    }
}

/// Shop stored in database.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Shop {
    /// Identity provider organization id
    pub id: String,
    pub name: String,
    pub slug: String,
    pub shop_type: ShopType,
    pub plan_id: Option<String>,
    pub plan_status: Option<String>,
    pub subscription_id: Option<String>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Billing fields pushed through the organization's private metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingMetadata {
    pub plan_id: String,
    pub plan_status: String,
    pub subscription_id: Option<String>,
    pub trial_ends_at: Option<DateTime<Utc>>,
}

impl BillingMetadata {
    /// Extract billing fields from a private metadata object.
    ///
    /// Returns `None` when there is no metadata object at all; an object
    /// without billing keys yields the starter/active defaults.
    pub fn from_private_metadata(metadata: Option<&Value>) -> Option<Self> {
        let object = metadata?.as_object()?;

        let string_field = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| object.get(*key).and_then(Value::as_str))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let trial_ends_at = object.get("trialEndsAt").and_then(|value| match value {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
            _ => None,
        });

        Some(Self {
            plan_id: string_field(&["planId"]).unwrap_or_else(|| DEFAULT_PLAN_ID.to_string()),
            plan_status: string_field(&["planStatus"])
                .unwrap_or_else(|| DEFAULT_PLAN_STATUS.to_string()),
            subscription_id: string_field(&["stripeSubscriptionId", "subscriptionId"]),
            trial_ends_at,
        })
    }
}

/// Derive a URL slug from a shop name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}
