//! # Runtime
//!
//! Startup wiring shared by the binary and embedding callers.

pub mod initialization;

pub use initialization::{assemble, initialize, Installer};
