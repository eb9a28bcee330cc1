//! Row types for the catalog tables.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two catalog tables the batcher writes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CatalogTable {
    /// `catalog_items`: top-level catalog entries.
    Items,
    /// `catalog_variants`: variants of a catalog entry.
    Variants,
}

impl CatalogTable {
    /// Returns the table name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Items => "catalog_items",
            Self::Variants => "catalog_variants",
        }
    }
}

impl fmt::Display for CatalogTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row destined for a catalog table.
///
/// `(shop_id, entity_id)` is the merge key. `raw` keeps the full upstream
/// record so columns can be added later without resyncing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Owning shop.
    pub shop_id: i64,
    /// Upstream item or variant identifier.
    pub entity_id: i64,
    /// Owning item, for variants.
    pub parent_id: Option<i64>,
    /// Display name.
    pub name: String,
    /// Upstream status, if reported.
    pub status: Option<String>,
    /// Seller SKU, if set.
    pub sku: Option<String>,
    /// Upstream creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Upstream last-update time.
    pub updated_at: Option<DateTime<Utc>>,
    /// Full upstream record.
    pub raw: serde_json::Value,
    /// When this sync run fetched the record.
    pub synced_at: DateTime<Utc>,
}

impl CatalogRecord {
    /// Returns the merge key.
    #[must_use]
    pub const fn key(&self) -> (i64, i64) {
        (self.shop_id, self.entity_id)
    }
}
