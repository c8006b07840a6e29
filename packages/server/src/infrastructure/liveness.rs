//! Liveness monitor: periodic ping sweep and eviction of dead connections.
//!
//! Each cycle pings every confirmed connection and collects the ones that
//! stayed silent for a full cycle. Stale connections get a close command
//! and are handed to the eviction callback, which runs the same cleanup
//! as a regular disconnect.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::UserId;

use super::registry::{ConnectionRegistry, OutboundCommand};

/// Cleanup hook invoked for each evicted connection.
pub type EvictFn = Arc<dyn Fn(UserId, Uuid) -> BoxFuture<'static, ()> + Send + Sync>;

pub struct LivenessMonitor {
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    evict: EvictFn,
}

impl LivenessMonitor {
    pub fn new(registry: Arc<ConnectionRegistry>, interval: Duration, evict: EvictFn) -> Self {
        Self {
            registry,
            interval,
            evict,
        }
    }

    /// Run the sweep loop until the task is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // The first tick fires immediately; skip it so connections get
            // a full cycle before the first real sweep.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.sweep_once().await;
            }
        })
    }

    async fn sweep_once(&self) {
        let stale = self.registry.liveness_sweep().await;
        for (user_id, connection_id) in stale {
            tracing::info!(
                "Evicting unresponsive connection {} of '{}'",
                connection_id,
                user_id
            );
            if let Some(sender) = self.registry.lookup(&user_id).await {
                // The pusher loop closes the socket; cleanup below handles
                // the case where the loop is already gone.
                let _ = sender.send(OutboundCommand::Close);
            }
            (self.evict)(user_id, connection_id).await;
        }
    }
}
