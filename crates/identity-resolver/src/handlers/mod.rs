//! HTTP request handlers for the identity resolver.

pub mod health;
pub mod logout;
pub mod me;
pub mod metrics;

pub use health::health_check;
pub use logout::{logout, reset_sessions};
pub use me::{get_internal_me, get_me};
pub use metrics::metrics_handler;
