//! Workspace placeholder crate.
//!
//! This crate exposes feature flags that map to the individual workspace
//! crates. Host applications can depend on `skatefit-workspace` and enable
//! `desktop-shims` (default bridges) or `headless` (host supplies every
//! bridge) without wiring each crate individually.

#[cfg(any(feature = "desktop-shims", feature = "headless"))]
pub use core_service::*;
