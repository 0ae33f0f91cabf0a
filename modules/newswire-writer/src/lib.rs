pub mod chat;
pub mod email;
pub mod limits;
pub mod minigame;
pub mod selection;
pub mod weights;
pub mod writer;

pub use email::FooterLinks;
pub use writer::{CliOverrides, WriterJob, WriterKind};
