//! UI layer: the axum server, its handlers and the message router.

mod handler;
pub mod router;
mod server;
mod signal;
pub mod state;

pub use server::{Server, routes};
