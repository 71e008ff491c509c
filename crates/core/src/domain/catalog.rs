use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Longest text the catalog tables accept in bounded columns.
pub const MAX_TEXT_LEN: usize = 255;

/// Upper quantity bound used for the last (open-ended) price tier.
pub const OPEN_ENDED_MAX_QUANTITY: i64 = 999_999;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRecord {
    pub code: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotProductRecord {
    pub reference: String,
    pub name: String,
    pub short_description: String,
    pub full_description: String,
    pub material: String,
    pub dimensions: String,
    pub approximate_weight: String,
    pub available_colors: String,
    pub base_cost: Decimal,
    pub supplier: String,
    pub main_image: String,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotPriceRecord {
    pub product_reference: String,
    pub sku: String,
    pub min_quantity: i64,
    pub max_quantity: i64,
    pub unit_price: Decimal,
}

impl SpotPriceRecord {
    pub fn new(product_reference: &str, min_quantity: i64, max_quantity: i64, unit_price: Decimal) -> Self {
        Self {
            product_reference: product_reference.to_string(),
            sku: price_sku(product_reference, min_quantity, max_quantity),
            min_quantity,
            max_quantity,
            unit_price,
        }
    }
}

/// Conflict key of a spot price tier: `{reference}-{min}-{max}`.
pub fn price_sku(product_reference: &str, min_quantity: i64, max_quantity: i64) -> String {
    format!("{product_reference}-{min_quantity}-{max_quantity}")
}

/// Customizable catalog product as read by the price lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub sku_base: String,
    pub name: String,
}

/// Tier of the customizable catalog, keyed by product SKU and personalization areas.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPriceTier {
    pub product_sku: String,
    pub area_count: i64,
    pub min_quantity: i64,
    pub max_quantity: i64,
    pub unit_price: Decimal,
}

impl CatalogPriceTier {
    pub fn covers(&self, quantity: i64) -> bool {
        self.min_quantity <= quantity && quantity <= self.max_quantity
    }
}

/// Spot (ready-stock) product as read by the inventory lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotProduct {
    pub id: i64,
    pub reference: String,
    pub name: String,
    pub short_description: String,
    pub base_cost: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotPriceTier {
    pub product_id: i64,
    pub min_quantity: i64,
    pub max_quantity: i64,
    pub unit_price: Decimal,
}

impl SpotPriceTier {
    pub fn covers(&self, quantity: i64) -> bool {
        self.min_quantity <= quantity && quantity <= self.max_quantity
    }
}
