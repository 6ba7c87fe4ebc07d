//! Shared domain types for the rollmon production monitor.
//!
//! Everything here is plain data plus the small state transitions that the
//! alert and target records own. Evaluation, prioritisation and persistence
//! live in the `rollmon-alert`, `rollmon-notify` and `rollmon-storage`
//! crates respectively.

#[macro_use]
mod macros;

pub mod notification;
pub mod serde_util;
pub mod types;
