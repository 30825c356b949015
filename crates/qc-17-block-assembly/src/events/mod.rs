//! Event schemas published by block assembly

pub mod outbound;

pub use outbound::{BlockAssembledEvent, EVENT_VERSION};
