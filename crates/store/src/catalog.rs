//! Authoritative product catalog: prices, sale status, and durable stock.
//!
//! The catalog holds the stock value of record. The TCC Confirm phase
//! decrements it through [`CatalogStore::deduct_stock`], a conditional
//! write guarded by a quantity-available predicate; a reservation release
//! is never issued after a successful durable deduction for the same
//! units.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::SkuId;
use domain::Product;

use crate::error::Result;
use crate::stock::StockStore;

/// Durable product and stock storage.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Looks up a product by SKU.
    async fn product(&self, sku: &SkuId) -> Result<Option<Product>>;

    /// Inserts or replaces a product.
    async fn put_product(&self, product: Product) -> Result<()>;

    /// Durably decrements stock, guarded by availability.
    ///
    /// Returns `false` (and changes nothing) when fewer than `quantity`
    /// units remain, the optimistic-concurrency equivalent of
    /// `UPDATE ... SET stock = stock - n WHERE stock >= n`.
    async fn deduct_stock(&self, sku: &SkuId, quantity: u32) -> Result<bool>;

    /// Overwrites the stock value for `sku`. Returns `false` when the SKU
    /// is unknown.
    async fn set_stock(&self, sku: &SkuId, quantity: u32) -> Result<bool>;

    /// Returns the durable stock value, or `None` for an unknown SKU.
    async fn stock(&self, sku: &SkuId) -> Result<Option<u32>>;
}

/// Mirrors every reservation counter back into the catalog's stock column.
///
/// Maintenance helper for campaign teardown; returns how many SKUs were
/// written.
pub async fn sync_counters_to_catalog(
    stock: &dyn StockStore,
    catalog: &dyn CatalogStore,
) -> Result<usize> {
    let mut synced = 0;
    for (sku, quantity) in stock.snapshot().await? {
        if catalog.set_stock(&sku, quantity).await? {
            synced += 1;
        } else {
            tracing::warn!(%sku, "counter exists for unknown catalog SKU, skipping");
        }
    }
    Ok(synced)
}

/// In-memory catalog for tests and single-process deployments.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<Mutex<HashMap<SkuId, Product>>>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn product(&self, sku: &SkuId) -> Result<Option<Product>> {
        let state = self.state.lock().unwrap();
        Ok(state.get(sku).cloned())
    }

    async fn put_product(&self, product: Product) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.insert(product.sku_id.clone(), product);
        Ok(())
    }

    async fn deduct_stock(&self, sku: &SkuId, quantity: u32) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        match state.get_mut(sku) {
            Some(product) if product.stock >= quantity => {
                product.stock -= quantity;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_stock(&self, sku: &SkuId, quantity: u32) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        match state.get_mut(sku) {
            Some(product) => {
                product.stock = quantity;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn stock(&self, sku: &SkuId) -> Result<Option<u32>> {
        let state = self.state.lock().unwrap();
        Ok(state.get(sku).map(|p| p.stock))
    }
}
