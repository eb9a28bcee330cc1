//! Concurrent, deduplicated item-id listing across status partitions.
//!
//! Each status is listed by its own pipeline:
//!
//! 1. Fetch page 0 and read `total_count`.
//! 2. Split the remaining `ceil(total_count / page_size) - 1` pages into
//!    groups of [`PAGE_GROUP_SIZE`].
//! 3. Fetch every page of a group concurrently, collect ids, then move the
//!    cursor to the next group.
//!
//! At most [`PAGE_GROUP_SIZE`] page requests are in flight per status. All
//! statuses run concurrently and their ids are merged into one set.
//!
//! A page whose item list is not a list ends its partition: ids already
//! collected for that status are kept, no further pages are requested, and
//! other statuses carry on.

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use futures::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sync::error::SyncError;

/// Items per page request.
pub const PAGE_SIZE: u32 = 100;

/// Pages requested concurrently per status.
pub const PAGE_GROUP_SIZE: usize = 10;

/// Item status partition understood by the item list endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    /// Live items.
    Normal,
    /// Items banned by the marketplace.
    Banned,
    /// Items hidden by the seller.
    Unlist,
    /// Items awaiting review.
    Reviewing,
    /// Items deleted by the seller.
    SellerDelete,
}

impl ItemStatus {
    /// Every status, in listing order.
    pub const ALL: [Self; 5] = [
        Self::Normal,
        Self::Banned,
        Self::Unlist,
        Self::Reviewing,
        Self::SellerDelete,
    ];

    /// Returns the wire value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Banned => "BANNED",
            Self::Unlist => "UNLIST",
            Self::Reviewing => "REVIEWING",
            Self::SellerDelete => "SELLER_DELETE",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of raw item-list pages.
///
/// Returns the envelope payload for one page; shape checking happens in
/// [`parse_item_page`].
#[async_trait]
pub trait ItemPageSource: Send + Sync {
    /// Fetches the page starting at `offset`.
    async fn fetch_page(
        &self,
        status: ItemStatus,
        offset: u64,
        page_size: u32,
    ) -> Result<Value, SyncError>;
}

/// A parsed item-list page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemPage {
    /// Item ids on this page.
    pub ids: Vec<i64>,
    /// Items in the whole partition.
    pub total_count: u64,
    /// Whether the server reports more pages.
    pub has_next_page: bool,
}

/// Why a page payload could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MalformedPage(pub String);

impl fmt::Display for MalformedPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parses an item-list payload.
///
/// A missing or `null` item list is an empty page. An item list of any
/// other non-list type, or an entry without an integer `item_id`, is
/// malformed.
///
/// # Errors
///
/// Returns [`MalformedPage`] describing the first shape problem found.
pub fn parse_item_page(payload: &Value) -> Result<ItemPage, MalformedPage> {
    let Some(object) = payload.as_object() else {
        return Err(MalformedPage("page payload is not an object".to_string()));
    };

    let total_count = match object.get("total_count") {
        None | Some(Value::Null) => 0,
        Some(value) => value
            .as_u64()
            .ok_or_else(|| MalformedPage(format!("total_count is not a count: {value}")))?,
    };
    let has_next_page = object
        .get("has_next_page")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let ids = match object.get("item") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.get("item_id")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| MalformedPage(format!("item without item_id: {item}")))
            })
            .collect::<Result<_, _>>()?,
        Some(other) => {
            return Err(MalformedPage(format!(
                "item list is not a list: {}",
                json_type(other)
            )))
        }
    };

    Ok(ItemPage {
        ids,
        total_count,
        has_next_page,
    })
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Lists item ids across status partitions with bounded concurrency.
///
/// # Example
///
/// ```rust,ignore
/// use partner_sync::sync::{ItemStatus, Paginator};
///
/// let ids = Paginator::new(&catalog_api)
///     .list_all_ids(&[ItemStatus::Normal, ItemStatus::Unlist])
///     .await?;
/// ```
#[derive(Debug)]
pub struct Paginator<'a, S: ?Sized> {
    source: &'a S,
    page_size: u32,
    group_size: usize,
}

impl<'a, S: ItemPageSource + ?Sized> Paginator<'a, S> {
    /// Creates a paginator with [`PAGE_SIZE`] and [`PAGE_GROUP_SIZE`].
    pub const fn new(source: &'a S) -> Self {
        Self {
            source,
            page_size: PAGE_SIZE,
            group_size: PAGE_GROUP_SIZE,
        }
    }

    /// Overrides the page size (minimum 1).
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Overrides the per-status concurrency (minimum 1).
    #[must_use]
    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size.max(1);
        self
    }

    /// Lists every item id in `statuses`, deduplicated and sorted.
    ///
    /// # Errors
    ///
    /// Returns the first [`SyncError`] any page fetch produced. Malformed
    /// pages are not errors.
    pub async fn list_all_ids(&self, statuses: &[ItemStatus]) -> Result<Vec<i64>, SyncError> {
        let partitions = try_join_all(statuses.iter().map(|&status| self.list_partition(status)))
            .await?;

        let ids: BTreeSet<i64> = partitions.into_iter().flatten().collect();
        tracing::info!(
            statuses = statuses.len(),
            ids = ids.len(),
            "listed catalog item ids"
        );
        Ok(ids.into_iter().collect())
    }

    async fn list_partition(&self, status: ItemStatus) -> Result<Vec<i64>, SyncError> {
        let first = self.source.fetch_page(status, 0, self.page_size).await?;
        let first = match parse_item_page(&first) {
            Ok(page) => page,
            Err(malformed) => {
                tracing::warn!(%status, page = 0, reason = %malformed, "malformed item page, skipping partition");
                return Ok(Vec::new());
            }
        };

        let mut ids = first.ids;
        let total_pages = first.total_count.div_ceil(u64::from(self.page_size));
        let remaining = total_pages.saturating_sub(1);
        tracing::debug!(%status, total_count = first.total_count, remaining_pages = remaining, "listing partition");

        let group_size = u64::try_from(self.group_size).unwrap_or(u64::MAX);
        let mut cursor: u64 = 1;
        while cursor <= remaining {
            let group_end = cursor.saturating_add(group_size).min(remaining + 1);
            let pages: Vec<u64> = (cursor..group_end).collect();

            let results = join_all(pages.iter().map(|&page| {
                self.source
                    .fetch_page(status, page * u64::from(self.page_size), self.page_size)
            }))
            .await;

            let mut malformed = false;
            for (page, result) in pages.iter().zip(results) {
                match parse_item_page(&result?) {
                    Ok(parsed) => ids.extend(parsed.ids),
                    Err(reason) => {
                        tracing::warn!(%status, page, %reason, "malformed item page, ending partition");
                        malformed = true;
                    }
                }
            }
            if malformed {
                break;
            }

            cursor = group_end;
        }

        Ok(ids)
    }
}
