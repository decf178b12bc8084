//! Request handlers.

pub mod http;
pub mod notification;
pub mod websocket;
