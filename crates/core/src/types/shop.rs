//! Seller shops.

use serde::{Deserialize, Serialize};

use super::id::ShopId;

/// A seller's shop as seen by the current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    /// Shop ID.
    pub id: ShopId,
    /// Display name.
    pub name: String,
    /// Number of users following the shop.
    pub followers_count: u64,
    /// Whether the current user follows the shop.
    pub is_following: bool,
}

impl Shop {
    /// Apply a follow toggle locally.
    ///
    /// Flips `is_following` and moves the follower count by one in the
    /// matching direction, never below zero.
    pub fn toggle_follow(&mut self) {
        if self.is_following {
            self.is_following = false;
            self.followers_count = self.followers_count.saturating_sub(1);
        } else {
            self.is_following = true;
            self.followers_count = self.followers_count.saturating_add(1);
        }
    }
}
