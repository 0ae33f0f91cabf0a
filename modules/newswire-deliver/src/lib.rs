pub mod chat;
pub mod email;
pub mod html_text;

pub use chat::ChatDeliverer;
pub use email::EmailDeliverer;
pub use html_text::html_to_wrapped_text;
