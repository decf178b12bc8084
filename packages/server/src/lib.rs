//! Live classroom coordinator.
//!
//! Presence, room chat, teacher-controlled attendance sessions and targeted
//! notification fan-out over WebSocket channels, coordinating the in-memory
//! real-time state the portal's CRUD side does not hold.

pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
