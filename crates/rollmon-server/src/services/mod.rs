//! Request-driven operations over the store. Handlers and the CLI go through
//! these; nothing else touches the store directly except the sweeper.

pub mod alerts;
pub mod monitor;
pub mod notifications;
pub mod targets;
pub mod templates;

pub use alerts::AlertLifecycle;
pub use monitor::{Ingestion, ProductionMonitor};
pub use notifications::{NotificationCenter, NotificationPage};
pub use targets::TargetAdmin;
pub use templates::{SeedOutcome, TemplateService};
