//! Data Transfer Objects for the coordinator.
//!
//! DTOs are organized by protocol:
//! - `websocket`: inbound/outbound WebSocket envelopes
//! - `http`: HTTP API response DTOs

pub mod conversion;
pub mod http;
pub mod websocket;
