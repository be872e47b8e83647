//! sleepchecker-idled - Idle watcher for the sleep checker face-detection service.
//!
//! Subscribes to desktop lifecycle signals, debounces them to a single
//! "screen dimmed" boolean and emits `screenDimmed(bool)` on `DBus`
//! whenever that boolean flips.

pub mod config;
pub mod domain;
pub mod monitor;
pub mod notify;
pub mod source;
