pub mod config;
pub mod datetime;
pub mod error;
pub mod scoring;
pub mod subject;
pub mod types;
pub mod weekday;

pub use config::{AiConfig, ChatConfig, MailConfig, RunnerConfig};
pub use error::NewswireError;
pub use types::*;
