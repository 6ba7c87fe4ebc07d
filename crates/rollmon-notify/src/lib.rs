//! Notification policy: priorities, expiry, delivery order, audience
//! visibility and template expansion.
//!
//! Everything here is pure. Persistence and the request surface live in
//! `rollmon-storage` and `rollmon-server`; this crate only decides what a
//! notification looks like and who may see it.

pub mod error;
pub mod priority;
pub mod stats;
pub mod template;
pub mod visibility;
