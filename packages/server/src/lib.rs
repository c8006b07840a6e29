//! Live co-streaming session coordinator.
//!
//! A WebSocket signaling and control plane for multi-party broadcast
//! sessions: session lifecycle, viewer and co-star membership, chat and
//! gift fan-out, moderation, WebRTC signaling relay and liveness
//! monitoring.
//!
//! Layered bottom-up: `domain` holds pure session state and rules,
//! `usecase` orchestrates locking and fan-out, `infrastructure` provides
//! the registry, store, broadcaster and wire DTOs, and `ui` exposes the
//! axum server.

pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
