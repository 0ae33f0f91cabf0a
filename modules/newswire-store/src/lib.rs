pub mod schema;
pub mod store;
pub mod types;

pub use store::Store;
pub use types::*;
