//! linklocal/crates/ll-core/src/lib.rs
//!
//! The workflow engine of the linklocal marketplace: domain models, the ports
//! plugins implement, and the engines that drive requests, offers and moderation.

pub mod catalog;
pub mod engine;
pub mod error;
pub mod models;
pub mod moderation;
pub mod notify;
pub mod patch;
pub mod policy;
pub mod store;
pub mod traits;
pub mod validate;
pub mod workflow;

// Re-exporting for easier access in other crates
pub use catalog::Reaction;
pub use engine::Marketplace;
pub use error::*;
pub use models::*;
pub use policy::{evaluate, Action, Decision, Target};
pub use traits::*;
