pub mod chat;
pub mod embedding;

pub use chat::{ChatMessage, ChatRequest, usage_tokens};
pub use embedding::{EmbeddingRequest, EmbeddingStub};
