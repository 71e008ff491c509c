pub mod catalog_import;
pub mod config;
pub mod domain;
pub mod errors;

pub use catalog_import::{color_records, price_records, product_records, VendorRecord};
pub use config::{AppConfig, ConfigError, ConfigOverrides, ConfigScope, LoadOptions, LogFormat};
pub use domain::catalog::{
    CatalogPriceTier, CatalogProduct, ColorRecord, SpotPriceRecord, SpotPriceTier, SpotProduct,
    SpotProductRecord,
};
pub use domain::conversation::{RunId, RunStatus, ThreadId};
pub use errors::{ApplicationError, ErrorClass};
