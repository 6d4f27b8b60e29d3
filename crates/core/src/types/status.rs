//! Status enums for various entities.

use serde::{Deserialize, Serialize};

/// Kind of marketplace account.
///
/// Unknown values from the backend are mapped to [`AccountType::Customer`],
/// the least privileged kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum AccountType {
    /// A shopper.
    #[default]
    Customer,
    /// Owns a shop and sells products.
    Seller,
    /// Marketplace operator.
    Admin,
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Seller => write!(f, "seller"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" | "user" | "buyer" => Ok(Self::Customer),
            "seller" => Ok(Self::Seller),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("unknown account type: {s}")),
        }
    }
}

impl From<String> for AccountType {
    fn from(s: String) -> Self {
        s.to_ascii_lowercase().parse().unwrap_or_default()
    }
}

/// Which way a wishlist toggle went, as decided by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WishlistAction {
    /// The product was not in the wishlist and now is.
    Added,
    /// The product was in the wishlist and no longer is.
    Removed,
}

impl std::fmt::Display for WishlistAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_round_trip() {
        for kind in [AccountType::Customer, AccountType::Seller, AccountType::Admin] {
            assert_eq!(kind.to_string().parse::<AccountType>(), Ok(kind));
        }
    }

    #[test]
    fn test_account_type_unknown_falls_back_to_customer() {
        let kind: AccountType = serde_json::from_str("\"moderator\"").unwrap();
        assert_eq!(kind, AccountType::Customer);

        let kind: AccountType = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(kind, AccountType::Customer);
    }

    #[test]
    fn test_wishlist_action_wire_names() {
        let action: WishlistAction = serde_json::from_str("\"removed\"").unwrap();
        assert_eq!(action, WishlistAction::Removed);
        assert_eq!(WishlistAction::Added.to_string(), "added");
    }
}
