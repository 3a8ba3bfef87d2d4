//! Follow-relationship engine for relgraph.
//!
//! [`FollowingService`] is the entry point. It is wired from trait objects
//! for blocking, identity, storage and delivery, so the same state machine
//! runs against `PostgreSQL` and Redis in production and against
//! [`MemoryBackend`] in tests.

pub mod services;

pub use services::*;
