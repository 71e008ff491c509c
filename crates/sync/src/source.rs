use std::fmt;

use async_trait::async_trait;
use lucia_core::catalog_import::VendorRecord;

use crate::error::SyncError;

/// Vendor session token, valid for the lifetime of one sync job.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(pub String);

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(**redacted**)")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CatalogResource {
    Colors,
    Products,
    Optionals,
}

impl CatalogResource {
    pub fn path(self) -> &'static str {
        match self {
            Self::Colors => "colors",
            Self::Products => "products",
            Self::Optionals => "optionals",
        }
    }

    /// Key of the record array inside the vendor's response envelope.
    pub fn collection_key(self) -> &'static str {
        match self {
            Self::Colors => "Colors",
            Self::Products => "Products",
            Self::Optionals => "Optionals",
        }
    }
}

impl fmt::Display for CatalogResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn authenticate(&self) -> Result<SessionToken, SyncError>;

    /// Records of one collection; a response without the collection yields none.
    async fn fetch(
        &self,
        token: &SessionToken,
        resource: CatalogResource,
    ) -> Result<Vec<VendorRecord>, SyncError>;
}
