//! Cart line storage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{CartLineId, UserId};
use domain::CartLine;

use crate::error::Result;

/// Persistence seam for cart lines.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Adds a line to a user's cart.
    async fn add_line(&self, line: CartLine) -> Result<()>;

    /// Returns the lines participating in a checkout: the given ids (owned
    /// by `user_id`), or every selected line when `line_ids` is `None`.
    async fn checkout_lines(
        &self,
        user_id: UserId,
        line_ids: Option<&[CartLineId]>,
    ) -> Result<Vec<CartLine>>;

    /// Removes the given lines (used once a checkout confirms).
    async fn remove_lines(&self, line_ids: &[CartLineId]) -> Result<()>;
}

/// In-memory cart store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartStore {
    state: Arc<Mutex<HashMap<u64, CartLine>>>,
}

impl InMemoryCartStore {
    /// Creates an empty cart store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored cart lines across all users.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().len()
    }

    /// Returns true if no cart lines are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn add_line(&self, line: CartLine) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.insert(line.id.value(), line);
        Ok(())
    }

    async fn checkout_lines(
        &self,
        user_id: UserId,
        line_ids: Option<&[CartLineId]>,
    ) -> Result<Vec<CartLine>> {
        let state = self.state.lock().unwrap();
        let mut lines: Vec<CartLine> = match line_ids {
            Some(ids) => state
                .values()
                .filter(|l| l.user_id == user_id && ids.contains(&l.id))
                .cloned()
                .collect(),
            None => state
                .values()
                .filter(|l| l.user_id == user_id && l.selected)
                .cloned()
                .collect(),
        };
        lines.sort_by_key(|l| l.id);
        Ok(lines)
    }

    async fn remove_lines(&self, line_ids: &[CartLineId]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for id in line_ids {
            state.remove(&id.value());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::SkuId;

    fn line(id: u64, user: u64, selected: bool) -> CartLine {
        CartLine {
            id: CartLineId::new(id),
            user_id: UserId::new(user),
            sku_id: SkuId::new(format!("SKU-{id}")),
            quantity: 1,
            selected,
        }
    }

    #[tokio::test]
    async fn explicit_ids_filter_by_owner() {
        let store = InMemoryCartStore::new();
        store.add_line(line(1, 1, false)).await.unwrap();
        store.add_line(line(2, 2, false)).await.unwrap();

        let ids = [CartLineId::new(1), CartLineId::new(2)];
        let lines = store
            .checkout_lines(UserId::new(1), Some(&ids))
            .await
            .unwrap();
        // Line 2 belongs to another user and is ignored.
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].id, CartLineId::new(1));
    }

    #[tokio::test]
    async fn without_ids_only_selected_lines_participate() {
        let store = InMemoryCartStore::new();
        store.add_line(line(1, 1, true)).await.unwrap();
        store.add_line(line(2, 1, false)).await.unwrap();

        let lines = store.checkout_lines(UserId::new(1), None).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].id, CartLineId::new(1));
    }

    #[tokio::test]
    async fn remove_lines_deletes_rows() {
        let store = InMemoryCartStore::new();
        store.add_line(line(1, 1, true)).await.unwrap();
        store.add_line(line(2, 1, true)).await.unwrap();

        store.remove_lines(&[CartLineId::new(1)]).await.unwrap();
        assert_eq!(store.len(), 1);
    }
}
