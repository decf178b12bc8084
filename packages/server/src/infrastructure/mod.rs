//! Infrastructure layer: shared live state, wire DTOs and collaborator
//! implementations.

pub mod collaborator;
pub mod dto;
pub mod pusher;
pub mod registry;
pub mod room_hub;
