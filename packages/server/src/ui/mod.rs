//! UI layer: HTTP/WebSocket surface.

pub mod handler;
pub mod server;
pub mod signal;
pub mod state;
