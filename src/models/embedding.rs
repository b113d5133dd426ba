use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const EMBEDDINGS_UNAVAILABLE_WARNING: &str = "Embeddings not available in this deployment.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EmbeddingRequest {
    pub fn with_default_model(mut self, model_id: &str) -> Self {
        if self.model.as_deref().is_none_or(str::is_empty) {
            self.model = Some(model_id.to_string());
        }
        self
    }
}

/// 后端不支持向量接口时返回的降级响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingStub {
    pub data: Vec<Value>,
    pub model: String,
    pub object: String,
    pub warning: String,
}

impl EmbeddingStub {
    pub fn unavailable(model: &str) -> Self {
        Self {
            data: Vec::new(),
            model: model.to_string(),
            object: "list".to_string(),
            warning: EMBEDDINGS_UNAVAILABLE_WARNING.to_string(),
        }
    }
}
