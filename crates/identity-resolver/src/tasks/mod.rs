//! Background tasks for the identity resolver.
//!
//! # Tasks
//!
//! - `cache_sweeper` - Drops expired identity cache entries (optional)

pub mod cache_sweeper;

pub use cache_sweeper::start_cache_sweeper;
