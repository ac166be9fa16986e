pub mod attributes;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod offload;
pub mod sqs;

pub use error::{PublishError, Result};
