//! User profile snapshot held by the session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::UserId;
use super::status::AccountType;

/// The signed-in user's profile, as last returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Email address, when the backend exposes it.
    #[serde(default)]
    pub email: Option<String>,
    /// Kind of account.
    #[serde(default)]
    pub account_type: AccountType,
    /// Account creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Whether the account may manage a shop.
    #[must_use]
    pub const fn is_seller(&self) -> bool {
        matches!(self.account_type, AccountType::Seller | AccountType::Admin)
    }
}
