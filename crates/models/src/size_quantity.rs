use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::size::SizeId;

/// Backend identifier of a persisted size-quantity row
pub type SizeQuantityId = i64;

/// Stock and pricing of one product in one size
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct SizeQuantity {
    pub id: SizeQuantityId,
    pub quantity: u32,
    pub size_id: SizeId,
    pub custom_product_id: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub discount: f64,
}

/// Row body for `POST /size-quantity` and `PATCH /size-quantity/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct UpsertSizeQuantity {
    pub quantity: u32,
    pub size_id: SizeId,
    pub custom_product_id: String,
    pub price: f64,
    pub discount: f64,
}

impl From<&SizeQuantity> for UpsertSizeQuantity {
    fn from(row: &SizeQuantity) -> Self {
        Self {
            quantity: row.quantity,
            size_id: row.size_id,
            custom_product_id: row.custom_product_id.clone(),
            price: row.price,
            discount: row.discount,
        }
    }
}
