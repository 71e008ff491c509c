use std::sync::Arc;
use std::time::{Duration, Instant};

use lucia_core::catalog_import::{color_records, price_records, product_records};
use lucia_db::{CatalogWriter, RepositoryError};
use serde::{Serialize, Serializer};
use tracing::info;

use crate::error::SyncError;
use crate::source::{CatalogResource, CatalogSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchSizes {
    pub colors: usize,
    pub products: usize,
    pub prices: usize,
}

impl Default for BatchSizes {
    fn default() -> Self {
        Self { colors: 50, products: 50, prices: 100 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SyncReport {
    pub colors: usize,
    pub products: usize,
    pub prices: usize,
    #[serde(rename = "duration_secs", serialize_with = "serialize_secs")]
    pub duration: Duration,
}

impl SyncReport {
    /// Elapsed time rendered the way the sync endpoint reports it, e.g. `"3.42"`.
    pub fn duration_label(&self) -> String {
        format!("{:.2}", self.duration.as_secs_f64())
    }
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

pub struct CatalogSyncJob {
    source: Arc<dyn CatalogSource>,
    writer: Arc<dyn CatalogWriter>,
    batch_sizes: BatchSizes,
}

impl CatalogSyncJob {
    pub fn new(source: Arc<dyn CatalogSource>, writer: Arc<dyn CatalogWriter>) -> Self {
        Self { source, writer, batch_sizes: BatchSizes::default() }
    }

    pub fn with_batch_sizes(mut self, batch_sizes: BatchSizes) -> Self {
        self.batch_sizes = batch_sizes;
        self
    }

    /// Runs one full import. Any failure aborts the remaining steps; rows
    /// already written by earlier batches stay in place.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        info!(event_name = "sync.started", "catalog sync started");

        let token = self.source.authenticate().await?;
        let (colors, products, optionals) = tokio::try_join!(
            self.source.fetch(&token, CatalogResource::Colors),
            self.source.fetch(&token, CatalogResource::Products),
            self.source.fetch(&token, CatalogResource::Optionals),
        )?;

        let colors = color_records(&colors);
        let products = product_records(&products);
        let prices = price_records(&optionals);

        let writer = self.writer.as_ref();
        upsert_in_batches("spot_cores", &colors, self.batch_sizes.colors, |batch| {
            writer.upsert_colors(batch)
        })
        .await?;
        upsert_in_batches("spot_produtos", &products, self.batch_sizes.products, |batch| {
            writer.upsert_products(batch)
        })
        .await?;
        upsert_in_batches("spot_precos", &prices, self.batch_sizes.prices, |batch| {
            writer.upsert_prices(batch)
        })
        .await?;

        let report = SyncReport {
            colors: colors.len(),
            products: products.len(),
            prices: prices.len(),
            duration: started.elapsed(),
        };
        info!(
            event_name = "sync.completed",
            colors = report.colors,
            products = report.products,
            prices = report.prices,
            duration_secs = %report.duration_label(),
            "catalog sync completed"
        );
        Ok(report)
    }
}

async fn upsert_in_batches<'a, T, F, Fut>(
    table: &'static str,
    records: &'a [T],
    batch_size: usize,
    upsert: F,
) -> Result<(), SyncError>
where
    F: Fn(&'a [T]) -> Fut,
    Fut: std::future::Future<Output = Result<u64, RepositoryError>>,
{
    for (index, batch) in records.chunks(batch_size.max(1)).enumerate() {
        upsert(batch).await.map_err(|source| SyncError::Store { table, source })?;
        info!(
            event_name = "sync.batch.written",
            table,
            batch = index + 1,
            rows = batch.len(),
            "upserted batch"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use lucia_core::catalog_import::VendorRecord;
    use lucia_core::domain::catalog::{ColorRecord, SpotPriceRecord, SpotProductRecord};
    use lucia_db::{CatalogWriter, InMemoryCatalogStore, RepositoryError};
    use serde_json::json;

    use super::{BatchSizes, CatalogSyncJob};
    use crate::error::SyncError;
    use crate::source::{CatalogResource, CatalogSource, SessionToken};

    #[derive(Default)]
    struct FakeSource {
        collections: HashMap<CatalogResource, Vec<VendorRecord>>,
        reject_authentication: bool,
    }

    impl FakeSource {
        fn with(mut self, resource: CatalogResource, records: Vec<serde_json::Value>) -> Self {
            let records =
                records.into_iter().filter_map(|record| record.as_object().cloned()).collect();
            self.collections.insert(resource, records);
            self
        }
    }

    #[async_trait]
    impl CatalogSource for FakeSource {
        async fn authenticate(&self) -> Result<SessionToken, SyncError> {
            if self.reject_authentication {
                return Err(SyncError::Authentication("invalid AccessKey".to_string()));
            }
            Ok(SessionToken("tok".to_string()))
        }

        async fn fetch(
            &self,
            _token: &SessionToken,
            resource: CatalogResource,
        ) -> Result<Vec<VendorRecord>, SyncError> {
            Ok(self.collections.get(&resource).cloned().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct RecordingWriter {
        calls: Mutex<Vec<(&'static str, usize)>>,
        fail_on_products: bool,
    }

    impl RecordingWriter {
        fn record(&self, table: &'static str, rows: usize) {
            self.calls.lock().expect("calls lock").push((table, rows));
        }

        fn calls(&self) -> Vec<(&'static str, usize)> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl CatalogWriter for RecordingWriter {
        async fn upsert_colors(&self, batch: &[ColorRecord]) -> Result<u64, RepositoryError> {
            self.record("colors", batch.len());
            Ok(batch.len() as u64)
        }

        async fn upsert_products(
            &self,
            batch: &[SpotProductRecord],
        ) -> Result<u64, RepositoryError> {
            self.record("products", batch.len());
            if self.fail_on_products {
                return Err(RepositoryError::Decode("disk full".to_string()));
            }
            Ok(batch.len() as u64)
        }

        async fn upsert_prices(&self, batch: &[SpotPriceRecord]) -> Result<u64, RepositoryError> {
            self.record("prices", batch.len());
            Ok(batch.len() as u64)
        }
    }

    fn colors(count: usize) -> Vec<serde_json::Value> {
        (1..=count).map(|code| json!({"ColorCode": format!("{code:03}"), "Description": "Cor"})).collect()
    }

    fn products(count: usize) -> Vec<serde_json::Value> {
        (1..=count).map(|index| json!({"ProdReference": format!("REF-{index}"), "Name": "Item"})).collect()
    }

    #[tokio::test]
    async fn collections_are_written_in_order_and_fixed_batches() {
        let source = FakeSource::default()
            .with(CatalogResource::Colors, colors(120))
            .with(CatalogResource::Products, products(51))
            .with(
                CatalogResource::Optionals,
                vec![json!({
                    "ProdReference": "REF-1",
                    "Price1": 10.0, "MinQt1": 1,
                    "Price2": 8.0, "MinQt2": 50
                })],
            );
        let writer = Arc::new(RecordingWriter::default());
        let job = CatalogSyncJob::new(Arc::new(source), writer.clone());

        let report = job.run().await.expect("sync");

        assert_eq!(
            writer.calls(),
            vec![
                ("colors", 50),
                ("colors", 50),
                ("colors", 20),
                ("products", 50),
                ("products", 1),
                ("prices", 2),
            ]
        );
        assert_eq!((report.colors, report.products, report.prices), (120, 51, 2));
    }

    #[tokio::test]
    async fn empty_collections_write_nothing() {
        let writer = Arc::new(RecordingWriter::default());
        let job = CatalogSyncJob::new(Arc::new(FakeSource::default()), writer.clone());

        let report = job.run().await.expect("sync");

        assert!(writer.calls().is_empty());
        assert_eq!((report.colors, report.products, report.prices), (0, 0, 0));
    }

    #[tokio::test]
    async fn authentication_failure_writes_nothing() {
        let source = FakeSource { reject_authentication: true, ..FakeSource::default() }
            .with(CatalogResource::Colors, colors(3));
        let writer = Arc::new(RecordingWriter::default());
        let job = CatalogSyncJob::new(Arc::new(source), writer.clone());

        let error = job.run().await.expect_err("auth should fail");

        assert!(matches!(error, SyncError::Authentication(_)));
        assert!(writer.calls().is_empty());
    }

    #[tokio::test]
    async fn store_failure_stops_remaining_collections() {
        let source = FakeSource::default()
            .with(CatalogResource::Colors, colors(2))
            .with(CatalogResource::Products, products(3))
            .with(
                CatalogResource::Optionals,
                vec![json!({"ProdReference": "REF-1", "Price1": 5, "MinQt1": 1})],
            );
        let writer = Arc::new(RecordingWriter { fail_on_products: true, ..RecordingWriter::default() });
        let job = CatalogSyncJob::new(Arc::new(source), writer.clone())
            .with_batch_sizes(BatchSizes { colors: 1, products: 2, prices: 10 });

        let error = job.run().await.expect_err("products should fail");

        assert!(matches!(error, SyncError::Store { table: "spot_produtos", .. }));
        assert_eq!(writer.calls(), vec![("colors", 1), ("colors", 1), ("products", 2)]);
    }

    #[tokio::test]
    async fn repeated_runs_leave_the_store_unchanged() {
        let source = Arc::new(
            FakeSource::default()
                .with(CatalogResource::Colors, colors(4))
                .with(CatalogResource::Products, products(3))
                .with(
                    CatalogResource::Optionals,
                    vec![json!({
                        "ProdReference": "REF-2",
                        "Price1": 3.5, "MinQt1": 1,
                        "Price2": 3.1, "MinQt2": 100,
                        "Price3": 2.9, "MinQt3": 500
                    })],
                ),
        );
        let store = Arc::new(InMemoryCatalogStore::default());
        let job = CatalogSyncJob::new(source, store.clone());

        job.run().await.expect("first sync");
        job.run().await.expect("second sync");

        assert_eq!(store.color_count().await, 4);
        assert_eq!(store.product_count().await, 3);
        assert_eq!(store.price_count().await, 3);
    }

    #[test]
    fn report_serializes_duration_in_seconds() {
        let report = super::SyncReport {
            colors: 1,
            products: 2,
            prices: 3,
            duration: std::time::Duration::from_millis(2_500),
        };

        let value = serde_json::to_value(&report).expect("serialize");

        assert_eq!(value["duration_secs"], json!(2.5));
        assert_eq!(report.duration_label(), "2.50");
    }
}
