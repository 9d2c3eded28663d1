//! POS menu reconciliation
//!
//! Categories and items are matched by external id first, then by name;
//! items whose category cannot be resolved land in a catch-all "Misc"
//! category. One restaurant's failure never aborts the batch.

use super::port::{MenuSnapshot, PosConnectors, PosError};
use crate::db::{Store, StoreError};
use crate::util::new_id;
use futures::StreamExt;
use serde::Serialize;
use shared::models::{MISC_CATEGORY_NAME, MenuCategory, MenuItem, Restaurant};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MenuSyncStats {
    pub categories_created: usize,
    pub categories_updated: usize,
    pub items_created: usize,
    pub items_updated: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestaurantSyncDetail {
    pub restaurant_id: String,
    pub outcome: SyncOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<MenuSyncStats>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Aggregate batch report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub details: Vec<RestaurantSyncDetail>,
}

#[derive(Debug, thiserror::Error)]
enum SyncError {
    #[error(transparent)]
    Pos(#[from] PosError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Apply a POS menu snapshot to a restaurant's menu
pub async fn apply_snapshot(
    store: &dyn Store,
    restaurant_id: &str,
    snapshot: &MenuSnapshot,
) -> Result<MenuSyncStats, StoreError> {
    let mut stats = MenuSyncStats::default();
    let mut categories = store.menu_categories(restaurant_id).await?;
    let mut items = store.menu_items(restaurant_id).await?;

    let mut pos_categories = snapshot.categories.clone();
    pos_categories.sort_by(|a, b| {
        a.sort_order
            .cmp(&b.sort_order)
            .then_with(|| a.external_id.cmp(&b.external_id))
    });

    // POS external category id -> our category id
    let mut category_ids: HashMap<String, String> = HashMap::new();
    for pos in &pos_categories {
        let existing = categories
            .iter()
            .position(|c| c.external_id.as_deref() == Some(pos.external_id.as_str()))
            .or_else(|| categories.iter().position(|c| same_name(&c.name, &pos.name)));

        let category = match existing {
            Some(idx) => {
                let c = &mut categories[idx];
                c.external_id = Some(pos.external_id.clone());
                c.name = pos.name.clone();
                c.sort_order = pos.sort_order;
                stats.categories_updated += 1;
                c.clone()
            }
            None => {
                let c = MenuCategory {
                    id: new_id(),
                    restaurant_id: restaurant_id.to_string(),
                    name: pos.name.clone(),
                    external_id: Some(pos.external_id.clone()),
                    sort_order: pos.sort_order,
                };
                categories.push(c.clone());
                stats.categories_created += 1;
                c
            }
        };
        store.upsert_category(&category).await?;
        category_ids.insert(pos.external_id.clone(), category.id);
    }

    let mut pos_items = snapshot.items.clone();
    pos_items.sort_by(|a, b| a.external_id.cmp(&b.external_id));

    let mut misc_id: Option<String> = None;
    for pos in &pos_items {
        let resolved = pos
            .category_external_id
            .as_ref()
            .and_then(|ext| category_ids.get(ext).cloned())
            .or_else(|| {
                pos.category_name.as_deref().and_then(|name| {
                    categories
                        .iter()
                        .find(|c| same_name(&c.name, name))
                        .map(|c| c.id.clone())
                })
            });
        let category_id = match resolved {
            Some(id) => id,
            None => match &misc_id {
                Some(id) => id.clone(),
                None => {
                    let id = misc_category(store, restaurant_id, &mut categories, &mut stats).await?;
                    misc_id = Some(id.clone());
                    id
                }
            },
        };

        let existing = items
            .iter()
            .position(|i| i.external_id.as_deref() == Some(pos.external_id.as_str()))
            .or_else(|| items.iter().position(|i| same_name(&i.name, &pos.name)));

        let item = match existing {
            Some(idx) => {
                let i = &mut items[idx];
                i.external_id = Some(pos.external_id.clone());
                i.name = pos.name.clone();
                i.price = pos.price;
                i.available = pos.available;
                i.category_id = category_id;
                stats.items_updated += 1;
                i.clone()
            }
            None => {
                let i = MenuItem {
                    id: new_id(),
                    restaurant_id: restaurant_id.to_string(),
                    category_id,
                    name: pos.name.clone(),
                    external_id: Some(pos.external_id.clone()),
                    price: pos.price,
                    available: pos.available,
                    variants: Vec::new(),
                    extras: Vec::new(),
                };
                items.push(i.clone());
                stats.items_created += 1;
                i
            }
        };
        store.upsert_menu_item(&item).await?;
    }

    Ok(stats)
}

async fn misc_category(
    store: &dyn Store,
    restaurant_id: &str,
    categories: &mut Vec<MenuCategory>,
    stats: &mut MenuSyncStats,
) -> Result<String, StoreError> {
    if let Some(c) = categories.iter().find(|c| same_name(&c.name, MISC_CATEGORY_NAME)) {
        return Ok(c.id.clone());
    }
    let misc = MenuCategory {
        id: new_id(),
        restaurant_id: restaurant_id.to_string(),
        name: MISC_CATEGORY_NAME.to_string(),
        external_id: None,
        sort_order: i32::MAX,
    };
    store.upsert_category(&misc).await?;
    categories.push(misc.clone());
    stats.categories_created += 1;
    Ok(misc.id)
}

async fn fetch_and_apply(
    store: &dyn Store,
    connectors: &dyn PosConnectors,
    restaurant: &Restaurant,
) -> Result<(MenuSnapshot, MenuSyncStats), SyncError> {
    let connector = connectors.for_restaurant(restaurant)?;
    let snapshot = connector.sync_menu().await?;
    if !snapshot.success {
        return Ok((snapshot, MenuSyncStats::default()));
    }
    let stats = apply_snapshot(store, &restaurant.id, &snapshot).await?;
    Ok((snapshot, stats))
}

async fn sync_one(
    store: &dyn Store,
    connectors: &dyn PosConnectors,
    restaurant: &Restaurant,
) -> RestaurantSyncDetail {
    let detail = |outcome, stats, errors| RestaurantSyncDetail {
        restaurant_id: restaurant.id.clone(),
        outcome,
        stats,
        errors,
    };

    if restaurant.settings_or_default().pos_credentials().is_none() {
        return detail(SyncOutcome::Skipped, None, Vec::new());
    }

    let result = fetch_and_apply(store, connectors, restaurant).await;

    match result {
        Ok((snapshot, stats)) if snapshot.success => {
            tracing::info!(restaurant_id = %restaurant.id, ?stats, "POS menu synced");
            detail(SyncOutcome::Success, Some(stats), snapshot.errors)
        }
        Ok((snapshot, _)) => {
            tracing::warn!(restaurant_id = %restaurant.id, errors = ?snapshot.errors, "POS reported menu sync failure");
            detail(SyncOutcome::Failed, None, snapshot.errors)
        }
        Err(e) => {
            tracing::warn!(restaurant_id = %restaurant.id, error = %e, "POS menu sync failed");
            detail(SyncOutcome::Failed, None, vec![e.to_string()])
        }
    }
}

/// Sync every restaurant's menu with bounded parallelism
pub async fn run_menu_sync(
    store: &dyn Store,
    connectors: &dyn PosConnectors,
    concurrency: usize,
) -> Result<SyncReport, StoreError> {
    let restaurants = store.list_restaurants().await?;
    let syncs: Vec<_> = restaurants
        .iter()
        .map(|r| sync_one(store, connectors, r))
        .collect();
    let mut details: Vec<RestaurantSyncDetail> = futures::stream::iter(syncs)
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;
    details.sort_by(|a, b| a.restaurant_id.cmp(&b.restaurant_id));

    let count = |o: SyncOutcome| details.iter().filter(|d| d.outcome == o).count();
    let report = SyncReport {
        total: details.len(),
        success: count(SyncOutcome::Success),
        failed: count(SyncOutcome::Failed),
        skipped: count(SyncOutcome::Skipped),
        details,
    };
    tracing::info!(
        total = report.total,
        success = report.success,
        failed = report.failed,
        skipped = report.skipped,
        "POS menu sync finished"
    );
    Ok(report)
}

/// Scheduled sync loop; a zero interval disables it
pub async fn run_scheduler(
    store: Arc<dyn Store>,
    connectors: Arc<dyn PosConnectors>,
    interval: Duration,
    concurrency: usize,
    shutdown: CancellationToken,
) {
    if interval.is_zero() {
        tracing::info!("POS menu sync disabled");
        return;
    }
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // skip immediate tick

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("POS menu sync scheduler shutting down");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = run_menu_sync(store.as_ref(), connectors.as_ref(), concurrency).await {
                    tracing::error!("Scheduled POS menu sync failed: {e}");
                }
            }
        }
    }
}
