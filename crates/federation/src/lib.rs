//! `ActivityPub` federation for relgraph.
//!
//! Typed Follow, Accept, Reject and Undo activities and the renderer that
//! turns the core's protocol messages into JSON-LD documents ready for
//! delivery.

pub mod activities;
pub mod renderer;

pub use activities::*;
pub use renderer::{ACTIVITY_STREAMS_CONTEXT, ApRenderer};
