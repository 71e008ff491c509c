use lucia_db::RepositoryError;
use thiserror::Error;

use crate::source::CatalogResource;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("vendor authentication failed: {0}")]
    Authentication(String),
    #[error("fetching vendor {resource} failed: {message}")]
    Fetch { resource: CatalogResource, message: String },
    #[error("writing {table} failed: {source}")]
    Store {
        table: &'static str,
        #[source]
        source: RepositoryError,
    },
}
