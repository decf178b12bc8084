//! Wire-format data transfer objects.

pub mod conversion;
pub mod http;
pub mod websocket;
