//! `PostgreSQL` tests for the upsert batcher and token store.
//!
//! These need a live database:
//!
//! ```text
//! DATABASE_URL=postgres://localhost/partner_sync_test cargo test -- --ignored
//! ```

use chrono::{DateTime, TimeZone, Utc};
use partner_sync::db::{
    self, CatalogRecord, CatalogTable, PgCatalogStore, PgTokenStore, UpsertBatcher,
};
use partner_sync::{DatabaseConfig, ShopId, TokenError, TokenSource};
use serde_json::json;
use sqlx::PgPool;

type Row = (
    i64,
    Option<i64>,
    String,
    Option<String>,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
    serde_json::Value,
    DateTime<Utc>,
);

async fn test_pool() -> PgPool {
    let config = DatabaseConfig::from_env().expect("DATABASE_URL must be set");
    let pool = db::create_pool(&config).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

/// A shop id no other test run uses.
fn unique_shop() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap() & 0x7fff_ffff_ffff
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn record(shop_id: i64, entity_id: i64, name: &str) -> CatalogRecord {
    CatalogRecord {
        shop_id,
        entity_id,
        parent_id: None,
        name: name.to_string(),
        status: Some("NORMAL".to_string()),
        sku: Some(format!("SKU-{entity_id}")),
        created_at: Some(at(1_600_000_000)),
        updated_at: Some(at(1_650_000_000)),
        raw: json!({"item_id": entity_id, "item_name": name}),
        synced_at: at(1_700_000_000),
    }
}

async fn rows(pool: &PgPool, table: CatalogTable, shop_id: i64) -> Vec<Row> {
    sqlx::query_as::<_, Row>(&format!(
        "SELECT entity_id, parent_id, name, sku, created_at, updated_at, raw, synced_at \
         FROM {} WHERE shop_id = $1 ORDER BY entity_id",
        table.name()
    ))
    .bind(shop_id)
    .fetch_all(pool)
    .await
    .unwrap()
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_upsert_is_idempotent() {
    let pool = test_pool().await;
    let shop = unique_shop();
    let records: Vec<_> = (1..=25).map(|i| record(shop, i, "Lamp")).collect();
    let batcher = UpsertBatcher::new(PgCatalogStore::new(pool.clone())).with_batch_size(10);

    let first = batcher.upsert(CatalogTable::Items, &records).await.unwrap();
    let after_first = rows(&pool, CatalogTable::Items, shop).await;
    let second = batcher.upsert(CatalogTable::Items, &records).await.unwrap();
    let after_second = rows(&pool, CatalogTable::Items, shop).await;

    assert_eq!(first.chunks_committed, 3);
    assert_eq!(first, second);
    assert_eq!(after_first.len(), 25);
    assert_eq!(after_first, after_second);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_merge_keeps_latest_update_and_coalesces_creation() {
    let pool = test_pool().await;
    let shop = unique_shop();
    let batcher = UpsertBatcher::new(PgCatalogStore::new(pool.clone()));

    batcher
        .upsert(CatalogTable::Variants, &[record(shop, 7, "Red")])
        .await
        .unwrap();

    // Older update time and no creation time.
    let mut stale = record(shop, 7, "Red/XL");
    stale.parent_id = Some(70);
    stale.created_at = None;
    stale.updated_at = Some(at(1_610_000_000));
    stale.synced_at = at(1_700_000_100);
    batcher
        .upsert(CatalogTable::Variants, &[stale])
        .await
        .unwrap();

    let merged = rows(&pool, CatalogTable::Variants, shop).await;
    assert_eq!(merged.len(), 1);
    let (_, parent_id, name, _, created_at, updated_at, raw, synced_at) = merged[0].clone();
    assert_eq!(parent_id, Some(70));
    assert_eq!(name, "Red/XL");
    assert_eq!(created_at, Some(at(1_600_000_000)));
    assert_eq!(updated_at, Some(at(1_650_000_000)));
    assert_eq!(raw["item_name"], "Red/XL");
    assert_eq!(synced_at, at(1_700_000_100));

    // Newer update time wins; an incoming creation time replaces the old one.
    let mut fresh = record(shop, 7, "Red/XL");
    fresh.created_at = Some(at(1_590_000_000));
    fresh.updated_at = Some(at(1_690_000_000));
    batcher
        .upsert(CatalogTable::Variants, &[fresh])
        .await
        .unwrap();

    let merged = rows(&pool, CatalogTable::Variants, shop).await;
    assert_eq!(merged[0].4, Some(at(1_590_000_000)));
    assert_eq!(merged[0].5, Some(at(1_690_000_000)));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_duplicate_keys_in_one_chunk_collapse() {
    let pool = test_pool().await;
    let shop = unique_shop();
    let batcher = UpsertBatcher::new(PgCatalogStore::new(pool.clone()));

    let report = batcher
        .upsert(
            CatalogTable::Items,
            &[record(shop, 1, "first"), record(shop, 1, "last")],
        )
        .await
        .unwrap();

    assert_eq!(report.rows_written, 1);
    let stored = rows(&pool, CatalogTable::Items, shop).await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].2, "last");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_token_store_reads_stored_token() {
    let pool = test_pool().await;
    let shop = unique_shop();
    sqlx::query("INSERT INTO partner_tokens (shop_id, access_token) VALUES ($1, $2)")
        .bind(shop)
        .bind("stored-token")
        .execute(&pool)
        .await
        .unwrap();
    let store = PgTokenStore::new(pool);

    let token = store
        .fetch_token(ShopId::new(shop.to_string()).unwrap())
        .await
        .unwrap();
    assert_eq!(token.as_ref(), "stored-token");

    let missing = ShopId::new((shop + 1).to_string()).unwrap();
    assert_eq!(
        store.fetch_token(missing).await.unwrap_err(),
        TokenError::NotFound { shop_id: missing }
    );
}
