use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Know-your-customer verification status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    #[default]
    NotStarted,
    Pending,
    Verified,
    Rejected,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Denormalized account profile, one row per user id.
///
/// Fetched separately from the identity check and may legitimately be
/// missing right after sign-up, before the backend has materialized the row.
/// Fields other than `id` default when absent or `null` so that sparse rows
/// still parse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "full_name")]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub kyc_status: KycStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: Role,
    /// Trading balance snapshot at fetch time
    #[serde(default, deserialize_with = "null_as_default")]
    pub trading_balance: f64,
    /// Free-form client preferences
    #[serde(default, deserialize_with = "null_as_default")]
    pub preferences: Map<String, Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            name: None,
            avatar_url: None,
            phone: None,
            kyc_status: KycStatus::default(),
            role: Role::default(),
            trading_balance: 0.0,
            preferences: Map::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Nullable columns come back as `null`; treat that like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
