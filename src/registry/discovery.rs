//! DiscoveryRegistry - deployment and API root metadata

use std::sync::RwLock;

use crate::errors::{StoreError, StoreResult};
use crate::model::{ApiRootInfo, Discovery};

#[derive(Debug, Default)]
struct DiscoveryState {
    discovery: Option<Discovery>,
    api_roots: Vec<ApiRootInfo>,
}

/// Discovery document plus per-root information, in provisioning order.
#[derive(Debug, Default)]
pub struct DiscoveryRegistry {
    state: RwLock<DiscoveryState>,
}

impl DiscoveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_discovery(&self, discovery: Discovery) -> StoreResult<()> {
        self.write()?.discovery = Some(discovery);
        Ok(())
    }

    /// Adds an API root, or replaces the one with the same name.
    pub fn put_api_root(&self, info: ApiRootInfo) -> StoreResult<()> {
        let mut state = self.write()?;
        match state.api_roots.iter_mut().find(|r| r.name == info.name) {
            Some(existing) => *existing = info,
            None => state.api_roots.push(info),
        }
        Ok(())
    }

    pub fn discovery(&self) -> StoreResult<Option<Discovery>> {
        Ok(self.read()?.discovery.clone())
    }

    pub fn api_root(&self, name: &str) -> StoreResult<Option<ApiRootInfo>> {
        Ok(self.read()?.api_roots.iter().find(|r| r.name == name).cloned())
    }

    pub fn root_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.read()?.api_roots.iter().map(|r| r.name.clone()).collect())
    }

    pub fn clear(&self) -> StoreResult<()> {
        *self.write()? = DiscoveryState::default();
        Ok(())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        let state = self.read()?;
        Ok(state.discovery.is_none() && state.api_roots.is_empty())
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, DiscoveryState>> {
        self.state
            .read()
            .map_err(|_| StoreError::poisoned("discovery registry"))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, DiscoveryState>> {
        self.state
            .write()
            .map_err(|_| StoreError::poisoned("discovery registry"))
    }
}
