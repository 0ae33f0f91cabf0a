pub mod adapter;
pub mod adapters;
pub mod collector;
pub mod http;
pub mod registry;

pub use adapter::{AdapterDescriptor, Capability, ScraperAdapter};
pub use collector::{CollectStats, Collector};
pub use http::HttpClient;
