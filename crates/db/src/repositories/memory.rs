use std::collections::HashMap;

use tokio::sync::RwLock;

use lucia_core::domain::catalog::{
    CatalogPriceTier, CatalogProduct, ColorRecord, SpotPriceRecord, SpotPriceTier, SpotProduct,
    SpotProductRecord,
};

use super::{
    dedupe_last_wins, name_matches, single, CatalogRepository, CatalogWriter, RepositoryError,
};

#[derive(Default)]
struct SpotTables {
    colors: HashMap<String, ColorRecord>,
    // Insertion order doubles as the product id (1-based), like an autoincrement key.
    products: Vec<SpotProductRecord>,
    prices: HashMap<String, SpotPriceRecord>,
}

impl SpotTables {
    fn product_id(&self, reference: &str) -> Option<i64> {
        self.products
            .iter()
            .position(|product| product.reference == reference)
            .map(|index| index as i64 + 1)
    }

    fn spot_product(&self, index: usize) -> SpotProduct {
        let record = &self.products[index];
        SpotProduct {
            id: index as i64 + 1,
            reference: record.reference.clone(),
            name: record.name.clone(),
            short_description: record.short_description.clone(),
            base_cost: record.base_cost,
        }
    }
}

/// Catalog store kept in process memory, used by tests and local runs.
#[derive(Default)]
pub struct InMemoryCatalogStore {
    catalog_products: RwLock<Vec<CatalogProduct>>,
    catalog_prices: RwLock<Vec<CatalogPriceTier>>,
    spot: RwLock<SpotTables>,
}

impl InMemoryCatalogStore {
    pub async fn insert_catalog_product(&self, product: CatalogProduct) {
        self.catalog_products.write().await.push(product);
    }

    pub async fn insert_catalog_price(&self, tier: CatalogPriceTier) {
        self.catalog_prices.write().await.push(tier);
    }

    pub async fn color_count(&self) -> usize {
        self.spot.read().await.colors.len()
    }

    pub async fn product_count(&self) -> usize {
        self.spot.read().await.products.len()
    }

    pub async fn price_count(&self) -> usize {
        self.spot.read().await.prices.len()
    }
}

#[async_trait::async_trait]
impl CatalogRepository for InMemoryCatalogStore {
    async fn find_catalog_product(
        &self,
        name_fragment: &str,
    ) -> Result<Option<CatalogProduct>, RepositoryError> {
        let products = self.catalog_products.read().await;
        let matches = products
            .iter()
            .filter(|product| name_matches(&product.name, name_fragment))
            .cloned()
            .collect();
        single(matches, "produtos")
    }

    async fn find_catalog_price(
        &self,
        product_sku: &str,
        area_count: i64,
        quantity: i64,
    ) -> Result<Option<CatalogPriceTier>, RepositoryError> {
        let prices = self.catalog_prices.read().await;
        let matches = prices
            .iter()
            .filter(|tier| {
                tier.product_sku == product_sku
                    && tier.area_count == area_count
                    && tier.covers(quantity)
            })
            .cloned()
            .collect();
        single(matches, "precos")
    }

    async fn find_spot_product_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<SpotProduct>, RepositoryError> {
        let spot = self.spot.read().await;
        let matches = (0..spot.products.len())
            .filter(|index| spot.products[*index].reference == reference)
            .map(|index| spot.spot_product(index))
            .collect();
        single(matches, "spot_produtos")
    }

    async fn find_spot_product_by_name(
        &self,
        name_fragment: &str,
    ) -> Result<Option<SpotProduct>, RepositoryError> {
        let spot = self.spot.read().await;
        let matches = (0..spot.products.len())
            .filter(|index| name_matches(&spot.products[*index].name, name_fragment))
            .map(|index| spot.spot_product(index))
            .collect();
        single(matches, "spot_produtos")
    }

    async fn find_spot_price(
        &self,
        product_id: i64,
        quantity: i64,
    ) -> Result<Option<SpotPriceTier>, RepositoryError> {
        let spot = self.spot.read().await;
        let matches = spot
            .prices
            .values()
            .filter_map(|price| {
                let id = spot.product_id(&price.product_reference)?;
                (id == product_id).then(|| SpotPriceTier {
                    product_id: id,
                    min_quantity: price.min_quantity,
                    max_quantity: price.max_quantity,
                    unit_price: price.unit_price,
                })
            })
            .filter(|tier| tier.covers(quantity))
            .collect();
        single(matches, "spot_precos")
    }
}

#[async_trait::async_trait]
impl CatalogWriter for InMemoryCatalogStore {
    async fn upsert_colors(&self, batch: &[ColorRecord]) -> Result<u64, RepositoryError> {
        let colors = dedupe_last_wins(batch, |color| color.code.clone());
        let mut spot = self.spot.write().await;
        for color in &colors {
            spot.colors.insert(color.code.clone(), color.clone());
        }
        Ok(colors.len() as u64)
    }

    async fn upsert_products(&self, batch: &[SpotProductRecord]) -> Result<u64, RepositoryError> {
        let products = dedupe_last_wins(batch, |product| product.reference.clone());
        let mut spot = self.spot.write().await;
        for product in &products {
            match spot.products.iter_mut().find(|stored| stored.reference == product.reference) {
                Some(stored) => *stored = product.clone(),
                None => spot.products.push(product.clone()),
            }
        }
        Ok(products.len() as u64)
    }

    async fn upsert_prices(&self, batch: &[SpotPriceRecord]) -> Result<u64, RepositoryError> {
        let prices = dedupe_last_wins(batch, |price| price.sku.clone());
        let mut spot = self.spot.write().await;
        for price in &prices {
            spot.prices.insert(price.sku.clone(), price.clone());
        }
        Ok(prices.len() as u64)
    }
}
