use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// 响应缓存键前缀
const RESPONSE_CACHE_PREFIX: &str = "cache:";

/// 生成响应缓存键：cache:{endpoint}:{model}:{sha256}
pub fn response_cache_key<T: Serialize>(
    endpoint: &str,
    model: &str,
    payload: &T,
) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(&serde_json::to_value(payload)?)?;
    let digest = Sha256::digest(&canonical);
    Ok(format!(
        "{}{}:{}:{:x}",
        RESPONSE_CACHE_PREFIX, endpoint, model, digest
    ))
}

/// 按键名排序后的紧凑 JSON
pub fn canonical_json(value: &Value) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&sorted(value))
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(fields) => {
            let mut entries: Vec<(&String, &Value)> = fields.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = Map::new();
            for (key, inner) in entries {
                out.insert(key.clone(), sorted(inner));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_payloads_share_a_key() {
        let a = json!({"messages": [{"role": "user", "content": "hi"}], "max_tokens": 10});
        let b = json!({"max_tokens": 10, "messages": [{"content": "hi", "role": "user"}]});
        assert_eq!(
            response_cache_key("chat", "m", &a).unwrap(),
            response_cache_key("chat", "m", &b).unwrap()
        );
    }

    #[test]
    fn differing_payload_or_model_changes_key() {
        let a = json!({"messages": [{"role": "user", "content": "hi"}]});
        let b = json!({"messages": [{"role": "user", "content": "hi!"}]});
        let base = response_cache_key("chat", "m1", &a).unwrap();
        assert_ne!(base, response_cache_key("chat", "m1", &b).unwrap());
        assert_ne!(base, response_cache_key("chat", "m2", &a).unwrap());
        assert_ne!(base, response_cache_key("embed", "m1", &a).unwrap());
    }

    #[test]
    fn key_layout() {
        let key = response_cache_key("chat", "Qwen/Qwen2", &json!({})).unwrap();
        let digest = key.strip_prefix("cache:chat:Qwen/Qwen2:").unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
