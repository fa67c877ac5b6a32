use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use super::lenient;
use crate::error::{BotError, Result};

/// Fleet reference meaning "not assigned to any fleet"
pub const UNASSIGNED_FLEET: &str = "0";

#[derive(Debug, Deserialize, Clone)]
pub struct PurchaseResponse {
    pub purchase: Purchase,
}

/// An unfinalized roll. Rerolling replaces the crew under the same kind
/// of transaction; accepting promotes it to a stored crew.
#[derive(Debug, Deserialize, Clone)]
pub struct Purchase {
    #[serde(rename = "transactionId", deserialize_with = "lenient::int")]
    pub transaction_id: i64,
    pub items: Vec<PurchasedCrew>,
}

impl Purchase {
    pub fn crew_type(&self) -> Result<u32> {
        self.items
            .first()
            .map(|item| item.crew_id)
            .ok_or_else(|| BotError::protocol("purchase has no items"))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PurchasedCrew {
    #[serde(deserialize_with = "lenient::uint")]
    pub crew_id: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AcceptResponse {
    pub item: StoredCrew,
}

/// A crew in storage: short type id plus the long opaque instance id
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StoredCrew {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::uint")]
    pub crew_id: u32,
    #[serde(default = "unassigned", deserialize_with = "lenient::string")]
    pub fleet_id: String,
}

fn unassigned() -> String {
    UNASSIGNED_FLEET.to_string()
}

impl StoredCrew {
    pub fn is_unassigned(&self) -> bool {
        self.fleet_id == UNASSIGNED_FLEET
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrewStorageResponse {
    #[serde(rename = "remainingSlots", deserialize_with = "lenient::int")]
    pub remaining_slots: i64,
    #[serde(default)]
    pub items: Vec<StoredCrew>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BalanceResponse {
    pub balances: HashMap<String, CurrencyBalance>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CurrencyBalance {
    #[serde(deserialize_with = "lenient::int")]
    pub amount: i64,
}

impl BalanceResponse {
    pub fn amount(&self, currency_id: u32) -> Option<i64> {
        self.balances.get(&currency_id.to_string()).map(|b| b.amount)
    }
}
