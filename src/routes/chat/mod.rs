mod handler;
mod model;

pub use handler::chat;
pub use model::{CHAT_PATH, ChatOutcome, RequestContext, process_chat};
