//! Infrastructure layer: connection registry, session store, fan-out
//! broadcaster, liveness monitor, wire DTOs and in-memory collaborator
//! implementations.

pub mod broadcaster;
pub mod collaborator;
pub mod dto;
pub mod liveness;
pub mod registry;
pub mod store;

pub use broadcaster::Broadcaster;
pub use collaborator::{InMemoryDurableStore, InMemoryUserDirectory, InMemoryVerificationService};
pub use liveness::{EvictFn, LivenessMonitor};
pub use registry::{ConnectionRegistry, ConnectionSender, OutboundCommand};
pub use store::SessionStore;
