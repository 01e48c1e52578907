//! Link registry.

use crate::config::{EngineConfig, LinkConfig};
use crate::direction::Direction;
use crate::error::{LinkError, LinkResult};
use crate::executor::SyncOutcome;
use crate::health::HealthReport;
use crate::link::{SyncLink, SyncStatus};
use crate::platform::Platform;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::info;
use uuid::Uuid;

/// Identifier of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(Uuid);

impl LinkId {
    /// Generates a fresh ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LinkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LinkId {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| LinkError::InvalidConfig(format!("bad link id {s:?}: {e}")))
    }
}

/// Owns every link and routes operations to them.
///
/// There is no global registry: construct one manager and pass it to
/// whatever surface exposes the operations.
pub struct LinkManager {
    platform: Arc<dyn Platform>,
    config: EngineConfig,
    links: RwLock<HashMap<LinkId, Arc<SyncLink>>>,
}

impl fmt::Debug for LinkManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkManager")
            .field("config", &self.config)
            .field("links", &self.links.read().len())
            .finish_non_exhaustive()
    }
}

impl LinkManager {
    /// Creates a manager with no links.
    pub fn new(platform: Arc<dyn Platform>, config: EngineConfig) -> Self {
        Self {
            platform,
            config,
            links: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Creates a link, subscribes it and starts its health monitor.
    ///
    /// Links run on the runtime this is called from.
    pub async fn add_link(&self, config: LinkConfig) -> LinkResult<LinkId> {
        config.validate()?;

        let id = LinkId::new();
        let link = SyncLink::new(
            id,
            config,
            self.config.clone(),
            self.platform.clone(),
            Handle::current(),
        );
        link.setup();
        link.start_health_monitor();

        info!(
            link = %id,
            a = %link.config().entity_a,
            b = %link.config().entity_b,
            mode = %link.config().sync_mode,
            progressive = %link.config().progressive_mode,
            "link added"
        );
        self.links.write().insert(id, link);
        Ok(id)
    }

    /// Tears a link down and forgets it.
    pub fn remove_link(&self, id: LinkId) -> LinkResult<()> {
        let link = self
            .links
            .write()
            .remove(&id)
            .ok_or(LinkError::LinkNotFound(id))?;
        link.shutdown();
        info!(link = %id, "link removed");
        Ok(())
    }

    /// Returns a link.
    pub fn link(&self, id: LinkId) -> LinkResult<Arc<SyncLink>> {
        self.links
            .read()
            .get(&id)
            .cloned()
            .ok_or(LinkError::LinkNotFound(id))
    }

    /// Returns the IDs of all links.
    pub fn link_ids(&self) -> Vec<LinkId> {
        let mut ids: Vec<_> = self.links.read().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Returns the status of a link.
    pub fn get_sync_status(&self, id: LinkId) -> LinkResult<SyncStatus> {
        Ok(self.link(id)?.status())
    }

    /// Forces a one-shot mirror in `direction`, bypassing cooldown.
    pub async fn manual_sync(&self, id: LinkId, direction: Direction) -> LinkResult<SyncOutcome> {
        let link = self.link(id)?;
        link.manual_sync(direction).await
    }

    /// Enables or disables a link.
    pub fn set_enabled(&self, id: LinkId, enabled: bool) -> LinkResult<()> {
        self.link(id)?.set_enabled(enabled);
        Ok(())
    }

    /// Unsubscribes a link and runs its setup again.
    pub fn reload(&self, id: LinkId) -> LinkResult<()> {
        self.link(id)?.reload();
        Ok(())
    }

    /// Runs a health check on a link now.
    pub async fn health_check(&self, id: LinkId) -> LinkResult<HealthReport> {
        let link = self.link(id)?;
        Ok(link.health_check().await)
    }

    /// Tears down every link.
    pub fn shutdown(&self) {
        let links: Vec<_> = self.links.write().drain().map(|(_, link)| link).collect();
        for link in links {
            link.shutdown();
        }
    }
}

impl Drop for LinkManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
