//! Payment configuration and the views derived from it.

use serde::{Deserialize, Serialize};

use super::{format_price, Gift};

/// The two scalar configuration values shared by every client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistryConfig {
    pub pix_key: String,
    /// Opaque encoded image, usually a data URI
    pub qrcode: String,
}

/// What a guest sees after committing a reservation or contribution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInstructions {
    pub gift_id: i64,
    pub gift_name: String,
    pub amount: f64,
    pub formatted_amount: String,
    pub pix_key: String,
    pub qrcode: String,
}

impl PaymentInstructions {
    pub fn new(gift: &Gift, amount: f64, config: &RegistryConfig) -> Self {
        Self {
            gift_id: gift.id,
            gift_name: gift.name.clone(),
            amount,
            formatted_amount: format_price(amount),
            pix_key: config.pix_key.clone(),
            qrcode: config.qrcode.clone(),
        }
    }
}

/// Aggregate numbers shown on the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySummary {
    pub reserved_count: usize,
    pub total_reserved_amount: f64,
    pub available_count: usize,
    pub unique_guests: usize,
    pub reserved: Vec<Gift>,
}

impl RegistrySummary {
    pub fn from_gifts(gifts: &[Gift]) -> Self {
        let reserved: Vec<Gift> = gifts.iter().filter(|g| g.is_taken()).cloned().collect();
        let total_reserved_amount = reserved.iter().map(|g| g.price).sum();
        let mut guests: Vec<&str> = reserved.iter().map(|g| g.reserved_by.as_str()).collect();
        guests.sort_unstable();
        guests.dedup();

        Self {
            reserved_count: reserved.len(),
            total_reserved_amount,
            available_count: gifts.len() - reserved.len(),
            unique_guests: guests.len(),
            reserved,
        }
    }
}
