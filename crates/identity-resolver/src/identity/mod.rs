//! Identity resolution and disclosure.

pub mod disclosure;
pub mod pipeline;

pub use disclosure::{DisclosedIdentity, DisclosureContract, SourceTrust, INTERNAL, PUBLIC};
pub use pipeline::{IdentityResolutionPipeline, Resolution};
