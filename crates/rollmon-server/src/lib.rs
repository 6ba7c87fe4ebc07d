//! HTTP server for the rollmon production monitor.
//!
//! Wires the storage backend, the alert evaluator and the notification
//! services together, exposes them as a JSON API and runs the notification
//! expiry sweeper in the background.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod services;
pub mod state;
pub mod sweeper;
