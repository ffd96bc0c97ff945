//! Notifications module
//!
//! Provides:
//! - Spark message payloads and targets
//! - The Spark messages API dispatcher

mod message;
mod spark;

pub use message::*;
pub use spark::*;
