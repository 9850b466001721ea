//! # Comment Harvest
//!
//! Harvests news articles and their reader comments into two flat, typed
//! tables. Comment threads of any depth are flattened so that every reply
//! row links to its direct parent.
//!
//! ## Architecture
//!
//! The library follows a pipeline architecture:
//! 1. **Search**: page through article search results ([`orchestrator`])
//! 2. **Fetch**: page through the comments of each article ([`collector`], [`api`])
//! 3. **Flatten**: surface nested replies with parent links ([`flatten`])
//! 4. **Normalize**: project raw records onto fixed schemas ([`normalize`])
//! 5. **Output**: write delimited files ([`outputs`])
//!
//! Everything runs sequentially. Failures end in a named [`error::StopReason`]
//! attached to the returned [`models::Dataset`], never in lost progress.

pub mod api;
pub mod collector;
pub mod config;
pub mod error;
pub mod flatten;
pub mod interrupt;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod outputs;
pub mod params;
pub mod utils;

#[cfg(test)]
mod testing;

pub use api::{ArticleSource, CommentSource, NytClient, Throttled};
pub use config::HarvestConfig;
pub use error::{FetchError, StopReason, ValidationError};
pub use interrupt::Interrupt;
pub use models::Dataset;
pub use orchestrator::{Caps, Harvester};
pub use params::SearchOptions;
