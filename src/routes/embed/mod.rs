mod handler;

pub use handler::{EMBED_PATH, embed};
