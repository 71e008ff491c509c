//! Scheduled import of the Spot Gifts vendor catalog into the catalog store.
//!
//! The job authenticates, fetches colours, products and price optionals
//! concurrently, reshapes them with [`lucia_core::catalog_import`] and upserts
//! each collection in fixed-size batches keyed by its natural vendor key.

pub mod error;
pub mod job;
pub mod source;
pub mod spot;

pub use error::SyncError;
pub use job::{BatchSizes, CatalogSyncJob, SyncReport};
pub use source::{CatalogResource, CatalogSource, SessionToken};
pub use spot::SpotCatalogClient;
