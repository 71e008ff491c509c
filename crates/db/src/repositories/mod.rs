use async_trait::async_trait;
use thiserror::Error;

use lucia_core::domain::catalog::{
    CatalogPriceTier, CatalogProduct, ColorRecord, SpotPriceRecord, SpotPriceTier, SpotProduct,
    SpotProductRecord,
};

pub mod catalog;
pub mod memory;

pub use catalog::SqlCatalogRepository;
pub use memory::InMemoryCatalogStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("expected at most one {entity} row, found several")]
    Ambiguous { entity: &'static str },
}

/// Reads performed by the assistant's catalog tools.
///
/// Every lookup returns `Ok(None)` for zero matches and
/// [`RepositoryError::Ambiguous`] when more than one row matches.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Case-insensitive substring match on the customizable catalog's product name.
    async fn find_catalog_product(
        &self,
        name_fragment: &str,
    ) -> Result<Option<CatalogProduct>, RepositoryError>;

    async fn find_catalog_price(
        &self,
        product_sku: &str,
        area_count: i64,
        quantity: i64,
    ) -> Result<Option<CatalogPriceTier>, RepositoryError>;

    async fn find_spot_product_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<SpotProduct>, RepositoryError>;

    /// Case-insensitive substring match on the spot product name.
    async fn find_spot_product_by_name(
        &self,
        name_fragment: &str,
    ) -> Result<Option<SpotProduct>, RepositoryError>;

    async fn find_spot_price(
        &self,
        product_id: i64,
        quantity: i64,
    ) -> Result<Option<SpotPriceTier>, RepositoryError>;
}

/// Idempotent batch upserts performed by the catalog sync.
///
/// Each call writes one batch in one statement and returns the number of rows
/// inserted or updated after duplicate keys inside the batch were collapsed.
#[async_trait]
pub trait CatalogWriter: Send + Sync {
    async fn upsert_colors(&self, batch: &[ColorRecord]) -> Result<u64, RepositoryError>;
    async fn upsert_products(&self, batch: &[SpotProductRecord]) -> Result<u64, RepositoryError>;
    async fn upsert_prices(&self, batch: &[SpotPriceRecord]) -> Result<u64, RepositoryError>;
}

/// Collapses records sharing a key, keeping the last occurrence at the first one's position.
pub(crate) fn dedupe_last_wins<T: Clone, K: Eq + std::hash::Hash>(
    batch: &[T],
    key: impl Fn(&T) -> K,
) -> Vec<T> {
    let mut positions = std::collections::HashMap::new();
    let mut unique: Vec<T> = Vec::with_capacity(batch.len());

    for record in batch {
        match positions.get(&key(record)) {
            Some(&index) => unique[index] = record.clone(),
            None => {
                positions.insert(key(record), unique.len());
                unique.push(record.clone());
            }
        }
    }

    unique
}

/// Case-insensitive substring match with full Unicode case folding.
pub(crate) fn name_matches(name: &str, fragment: &str) -> bool {
    name.to_lowercase().contains(&fragment.to_lowercase())
}

pub(crate) fn single<T>(mut rows: Vec<T>, entity: &'static str) -> Result<Option<T>, RepositoryError> {
    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.pop()),
        _ => Err(RepositoryError::Ambiguous { entity }),
    }
}
