//! # Wiring — a config-driven service container for Rust
//!
//! Declare services, their arguments, calls, tags and initializers in
//! JSON; the builder instantiates them, runs initializers in dependency
//! order, and hands back a populated [`Registry`].

pub use wiring_container::*;
pub use wiring_support::*;
