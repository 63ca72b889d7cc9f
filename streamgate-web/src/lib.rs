//! Streamgate Web - HTTP and WebSocket surface
//!
//! Exposes the resolution pipeline over axum: redirect endpoints for audio
//! and video streams, a download relay, catalog lookups, administrative
//! endpoints and a small WebSocket channel.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;
pub mod ws;

pub use error::ApiError;
pub use server::{AppState, build_router, run_server, spawn_maintenance};
