//! Product catalog endpoints and their mapping onto catalog records.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::clients::{AuthFlags, HttpMethod, PartnerRequest, RequestEngine};
use crate::config::ShopId;
use crate::db::CatalogRecord;
use crate::sync::error::SyncError;
use crate::sync::pagination::{ItemPageSource, ItemStatus};

/// Item list endpoint.
pub const GET_ITEM_LIST: &str = "/api/v2/product/get_item_list";
/// Item details endpoint.
pub const GET_ITEM_BASE_INFO: &str = "/api/v2/product/get_item_base_info";
/// Variant (model) list endpoint.
pub const GET_MODEL_LIST: &str = "/api/v2/product/get_model_list";

/// Most item ids the details endpoint accepts per call.
pub const MAX_ITEM_IDS_PER_CALL: usize = 50;

/// Typed access to the product catalog endpoints.
///
/// Each method maps its arguments onto one [`RequestEngine`] call and
/// validates the envelope, so business errors surface as
/// [`SyncError::Business`].
#[derive(Debug, Clone)]
pub struct CatalogApi {
    engine: Arc<RequestEngine>,
}

impl CatalogApi {
    /// Creates a catalog client over `engine`.
    #[must_use]
    pub const fn new(engine: Arc<RequestEngine>) -> Self {
        Self { engine }
    }

    /// Returns the shop the engine's credentials belong to.
    #[must_use]
    pub fn shop_id(&self) -> ShopId {
        self.engine.credentials().snapshot().shop_id
    }

    /// Fetches one page of item ids for `status`.
    ///
    /// # Errors
    ///
    /// Returns a transport or business error from the call.
    pub async fn get_item_list(
        &self,
        status: ItemStatus,
        offset: u64,
        page_size: u32,
    ) -> Result<Value, SyncError> {
        let request = PartnerRequest::builder(HttpMethod::Get, GET_ITEM_LIST)
            .auth(AuthFlags::shop())
            .param("offset", offset)
            .param("page_size", page_size)
            .param("item_status", vec![status.as_str()])
            .build()?;
        self.call(&request).await
    }

    /// Fetches item details for up to [`MAX_ITEM_IDS_PER_CALL`] ids.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::InvalidArgument` for an empty or oversized id list,
    /// `SyncError::InvalidPayload` if the payload has no item list, or a
    /// transport or business error from the call.
    pub async fn get_item_base_info(&self, item_ids: &[i64]) -> Result<Vec<Value>, SyncError> {
        if item_ids.is_empty() || item_ids.len() > MAX_ITEM_IDS_PER_CALL {
            return Err(SyncError::InvalidArgument {
                endpoint: GET_ITEM_BASE_INFO,
                message: format!(
                    "expected 1 to {MAX_ITEM_IDS_PER_CALL} item ids, got {}",
                    item_ids.len()
                ),
            });
        }

        let request = PartnerRequest::builder(HttpMethod::Get, GET_ITEM_BASE_INFO)
            .auth(AuthFlags::shop())
            .param("item_id_list", item_ids.to_vec())
            .build()?;
        let payload = self.call(&request).await?;

        match payload.get("item_list") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(_) => Err(SyncError::InvalidPayload {
                endpoint: GET_ITEM_BASE_INFO,
                message: "item_list is not a list".to_string(),
            }),
        }
    }

    /// Fetches the tier variations and models of one item.
    ///
    /// # Errors
    ///
    /// Returns a transport or business error from the call.
    pub async fn get_model_list(&self, item_id: i64) -> Result<Value, SyncError> {
        let request = PartnerRequest::builder(HttpMethod::Get, GET_MODEL_LIST)
            .auth(AuthFlags::shop())
            .param("item_id", item_id)
            .build()?;
        self.call(&request).await
    }

    async fn call(&self, request: &PartnerRequest) -> Result<Value, SyncError> {
        let envelope = self.engine.send(request).await.into_result()?;
        Ok(envelope.into_response()?)
    }
}

#[async_trait]
impl ItemPageSource for CatalogApi {
    async fn fetch_page(
        &self,
        status: ItemStatus,
        offset: u64,
        page_size: u32,
    ) -> Result<Value, SyncError> {
        self.get_item_list(status, offset, page_size).await
    }
}

fn unix_time(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_i64)
        .filter(|secs| *secs > 0)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Maps one entry of `get_item_base_info`'s `item_list` to an item record.
///
/// Returns `None` if the entry has no integer `item_id`.
#[must_use]
pub fn item_record(shop_id: ShopId, item: &Value, synced_at: DateTime<Utc>) -> Option<CatalogRecord> {
    let entity_id = item.get("item_id").and_then(Value::as_i64)?;
    Some(CatalogRecord {
        shop_id: shop_id.value(),
        entity_id,
        parent_id: None,
        name: non_empty_str(item.get("item_name")).unwrap_or_default(),
        status: non_empty_str(item.get("item_status")),
        sku: non_empty_str(item.get("item_sku")),
        created_at: unix_time(item.get("create_time")),
        updated_at: unix_time(item.get("update_time")),
        raw: item.clone(),
        synced_at,
    })
}

/// Returns `true` if an item entry reports variants.
#[must_use]
pub fn has_models(item: &Value) -> bool {
    item.get("has_model").and_then(Value::as_bool).unwrap_or(false)
}

/// Maps a `get_model_list` payload to variant records of `item_id`.
///
/// A model's name is its option labels, one per tier, joined with `/`
/// (e.g. `Red/XL`). Models without an integer `model_id` are skipped.
#[must_use]
pub fn variant_records(
    shop_id: ShopId,
    item_id: i64,
    payload: &Value,
    synced_at: DateTime<Utc>,
) -> Vec<CatalogRecord> {
    let tiers: Vec<Vec<String>> = payload
        .get("tier_variation")
        .and_then(Value::as_array)
        .map(|tiers| {
            tiers
                .iter()
                .map(|tier| {
                    tier.get("option_list")
                        .and_then(Value::as_array)
                        .map(|options| {
                            options
                                .iter()
                                .map(|o| {
                                    o.get("option")
                                        .and_then(Value::as_str)
                                        .unwrap_or_default()
                                        .to_string()
                                })
                                .collect()
                        })
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default();

    let Some(models) = payload.get("model").and_then(Value::as_array) else {
        return Vec::new();
    };

    models
        .iter()
        .filter_map(|model| {
            let entity_id = model.get("model_id").and_then(Value::as_i64)?;
            Some(CatalogRecord {
                shop_id: shop_id.value(),
                entity_id,
                parent_id: Some(item_id),
                name: model_name(&tiers, model.get("tier_index")),
                status: non_empty_str(model.get("model_status")),
                sku: non_empty_str(model.get("model_sku")),
                created_at: unix_time(model.get("create_time")),
                updated_at: unix_time(model.get("update_time")),
                raw: model.clone(),
                synced_at,
            })
        })
        .collect()
}

fn model_name(tiers: &[Vec<String>], tier_index: Option<&Value>) -> String {
    let Some(indices) = tier_index.and_then(Value::as_array) else {
        return String::new();
    };
    indices
        .iter()
        .enumerate()
        .filter_map(|(tier, index)| {
            let index = usize::try_from(index.as_u64()?).ok()?;
            tiers.get(tier)?.get(index).cloned()
        })
        .collect::<Vec<_>>()
        .join("/")
}
