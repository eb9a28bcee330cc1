//! Catalog retrieval on top of the request engine.
//!
//! # Overview
//!
//! - [`Paginator`]: concurrent, deduplicated id listing across
//!   [`ItemStatus`] partitions
//! - [`CatalogApi`]: the product endpoints, one engine call each
//! - [`CatalogSync`]: list ids, fetch details and variants, upsert both
//! - [`SyncError`]: everything that can stop a sync

mod catalog;
mod error;
mod pagination;
mod pipeline;

pub use catalog::{
    has_models, item_record, variant_records, CatalogApi, GET_ITEM_BASE_INFO, GET_ITEM_LIST,
    GET_MODEL_LIST, MAX_ITEM_IDS_PER_CALL,
};
pub use error::SyncError;
pub use pagination::{
    parse_item_page, ItemPage, ItemPageSource, ItemStatus, MalformedPage, Paginator,
    PAGE_GROUP_SIZE, PAGE_SIZE,
};
pub use pipeline::{CatalogSync, SyncReport, FETCH_CONCURRENCY};
