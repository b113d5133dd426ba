use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 对话补全请求，未识别的字段原样转发给后端
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatRequest {
    pub fn is_stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    /// 未指定模型时使用默认模型
    pub fn with_default_model(mut self, model_id: &str) -> Self {
        if self.model.as_deref().is_none_or(str::is_empty) {
            self.model = Some(model_id.to_string());
        }
        self
    }

    /// 仅整数形式的 max_tokens 参与截断，其他类型原样转发
    pub fn integer_max_tokens(&self) -> Option<i128> {
        match self.max_tokens.as_ref()? {
            Value::Number(n) => n
                .as_i64()
                .map(i128::from)
                .or_else(|| n.as_u64().map(i128::from)),
            _ => None,
        }
    }

    pub fn model_id(&self) -> &str {
        self.model.as_deref().unwrap_or_default()
    }
}

impl ChatMessage {
    /// 提取消息中的文本：字符串原样返回，分段内容拼接各段 text 字段
    pub fn text_content(&self) -> String {
        match &self.content {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(Value::Array(parts)) => parts
                .iter()
                .filter_map(|part| match part {
                    Value::String(text) => Some(text.as_str()),
                    Value::Object(fields) => fields.get("text").and_then(Value::as_str),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Some(other) => other.to_string(),
        }
    }
}

/// 响应中 usage 字段所有整数值之和
pub fn usage_tokens(response: &Value) -> u64 {
    response
        .get("usage")
        .and_then(Value::as_object)
        .map(|usage| usage.values().filter_map(Value::as_u64).sum())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_fields_survive_round_trip() {
        let request: ChatRequest = serde_json::from_value(json!({
            "messages": [{"role": "user", "content": "hi", "name": "bob"}],
            "temperature": 0.2
        }))
        .unwrap();
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["temperature"], json!(0.2));
        assert_eq!(value["messages"][0]["name"], json!("bob"));
        assert!(value.get("max_tokens").is_none());
    }

    #[test]
    fn default_model_only_fills_missing() {
        let request: ChatRequest = serde_json::from_value(json!({"messages": []})).unwrap();
        assert_eq!(request.with_default_model("m1").model_id(), "m1");

        let request: ChatRequest =
            serde_json::from_value(json!({"model": "m2", "messages": []})).unwrap();
        assert_eq!(request.with_default_model("m1").model_id(), "m2");
    }

    #[test]
    fn only_integer_max_tokens_is_recognised() {
        let parse = |value: serde_json::Value| -> ChatRequest {
            serde_json::from_value(json!({"messages": [], "max_tokens": value})).unwrap()
        };
        assert_eq!(parse(json!(1000)).integer_max_tokens(), Some(1000));
        assert_eq!(parse(json!(-3)).integer_max_tokens(), Some(-3));
        assert_eq!(parse(json!(1000.5)).integer_max_tokens(), None);
        assert_eq!(parse(json!("1000")).integer_max_tokens(), None);

        let value = serde_json::to_value(parse(json!(1000.5))).unwrap();
        assert_eq!(value["max_tokens"], json!(1000.5));
    }

    #[test]
    fn text_content_variants() {
        let message: ChatMessage = serde_json::from_value(json!({
            "role": "user",
            "content": [{"type": "text", "text": "a"}, {"type": "image_url"}, "b"]
        }))
        .unwrap();
        assert_eq!(message.text_content(), "a\nb");

        let message: ChatMessage = serde_json::from_value(json!({"role": "user"})).unwrap();
        assert_eq!(message.text_content(), "");
    }

    #[test]
    fn usage_sums_integer_fields() {
        let response = json!({
            "usage": {"prompt_tokens": 5, "completion_tokens": 7, "total_tokens": 12, "note": "x"}
        });
        assert_eq!(usage_tokens(&response), 24);
        assert_eq!(usage_tokens(&json!({})), 0);
    }
}
