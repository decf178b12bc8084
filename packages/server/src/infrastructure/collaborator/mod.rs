//! Collaborator implementations backed by in-process state.

pub mod inmemory;

pub use inmemory::{InMemoryAttendanceSink, InMemoryIdentityProvider, InMemoryRosterProvider};
