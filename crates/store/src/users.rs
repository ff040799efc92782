//! User and shipping address storage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{AddressId, UserId};
use domain::{Address, User};

use crate::error::{Result, StoreError};

/// Persistence seam for users and their shipping addresses.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn user(&self, id: UserId) -> Result<User>;

    async fn put_user(&self, user: User) -> Result<()>;

    async fn address(&self, id: AddressId) -> Result<Address>;

    async fn put_address(&self, address: Address) -> Result<()>;

    /// Deducts loyalty points from a user's balance. Returns `false`
    /// without changing anything when the balance is insufficient, the
    /// same shape as a guarded `UPDATE .. WHERE points >= ?`.
    async fn deduct_points(&self, id: UserId, points: u32) -> Result<bool>;
}

/// In-memory user store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    state: Arc<Mutex<UserState>>,
}

#[derive(Debug, Default)]
struct UserState {
    users: HashMap<u64, User>,
    addresses: HashMap<u64, Address>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn user(&self, id: UserId) -> Result<User> {
        let state = self.state.lock().unwrap();
        state
            .users
            .get(&id.value())
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "user",
                id: id.to_string(),
            })
    }

    async fn put_user(&self, user: User) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.users.insert(user.id.value(), user);
        Ok(())
    }

    async fn address(&self, id: AddressId) -> Result<Address> {
        let state = self.state.lock().unwrap();
        state
            .addresses
            .get(&id.value())
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "address",
                id: id.to_string(),
            })
    }

    async fn put_address(&self, address: Address) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.addresses.insert(address.id.value(), address);
        Ok(())
    }

    async fn deduct_points(&self, id: UserId, points: u32) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let user = state.users.get_mut(&id.value()).ok_or(StoreError::NotFound {
            entity: "user",
            id: id.to_string(),
        })?;
        if user.points < points {
            return Ok(false);
        }
        user.points -= points;
        Ok(true)
    }
}
