//! 内容安全检查：敏感词拦截与 max_tokens 上限。

use serde::Serialize;

use crate::models::chat::{ChatMessage, ChatRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyReason {
    Denylist,
    MaxTokensCapped,
}

impl SafetyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyReason::Denylist => "denylist",
            SafetyReason::MaxTokensCapped => "max_tokens_capped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyVerdict {
    pub allowed: bool,
    pub reason: Option<SafetyReason>,
    pub adjusted_max_tokens: Option<i64>,
}

impl SafetyVerdict {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            adjusted_max_tokens: None,
        }
    }

    fn blocked() -> Self {
        Self {
            allowed: false,
            reason: Some(SafetyReason::Denylist),
            adjusted_max_tokens: None,
        }
    }

    fn capped(ceiling: i64) -> Self {
        Self {
            allowed: true,
            reason: Some(SafetyReason::MaxTokensCapped),
            adjusted_max_tokens: Some(ceiling),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SafetyFilter {
    max_tokens_cap: i64,
    denylist: Vec<String>,
}

impl SafetyFilter {
    pub fn new(max_tokens_cap: i64, denylist_words: &[String]) -> Self {
        let mut denylist: Vec<String> = denylist_words
            .iter()
            .map(|word| word.trim().to_lowercase())
            .filter(|word| !word.is_empty())
            .collect();
        denylist.sort();
        denylist.dedup();

        Self {
            max_tokens_cap,
            denylist,
        }
    }

    /// 敏感词检查优先于 max_tokens 截断
    pub fn check(&self, payload: &ChatRequest) -> SafetyVerdict {
        if payload
            .messages
            .iter()
            .any(|message| self.contains_denied(message))
        {
            return SafetyVerdict::blocked();
        }

        match payload.integer_max_tokens() {
            Some(requested) if requested > i128::from(self.max_tokens_cap) => {
                SafetyVerdict::capped(self.max_tokens_cap)
            }
            _ => SafetyVerdict::allow(),
        }
    }

    fn contains_denied(&self, message: &ChatMessage) -> bool {
        if self.denylist.is_empty() {
            return false;
        }
        let text = message.text_content().to_lowercase();
        self.denylist.iter().any(|word| text.contains(word.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> ChatRequest {
        serde_json::from_value(value).unwrap()
    }

    fn filter() -> SafetyFilter {
        SafetyFilter::new(512, &["banword".to_string(), "hack".to_string()])
    }

    #[test]
    fn blocks_denylisted_word() {
        let verdict = filter().check(&request(json!({
            "messages": [{"role": "user", "content": "contains banword"}]
        })));
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason, Some(SafetyReason::Denylist));
        assert_eq!(verdict.adjusted_max_tokens, None);
    }

    #[test]
    fn match_is_case_insensitive_substring() {
        let verdict = filter().check(&request(json!({
            "messages": [{"role": "user", "content": "How do I Hacksaw a pipe?"}]
        })));
        assert!(!verdict.allowed);

        let upper_denylist = SafetyFilter::new(512, &["EXPLOIT".to_string()]);
        let verdict = upper_denylist.check(&request(json!({
            "messages": [{"role": "user", "content": "an exploit"}]
        })));
        assert!(!verdict.allowed);
    }

    #[test]
    fn scans_every_message_and_content_parts() {
        let verdict = filter().check(&request(json!({
            "messages": [
                {"role": "system", "content": "be nice"},
                {"role": "user", "content": [
                    {"type": "text", "text": "first part"},
                    {"type": "text", "text": "BANWORD here"}
                ]}
            ]
        })));
        assert!(!verdict.allowed);
    }

    #[test]
    fn caps_max_tokens() {
        let verdict = filter().check(&request(json!({
            "messages": [{"role": "user", "content": "hello"}],
            "max_tokens": 1000
        })));
        assert!(verdict.allowed);
        assert_eq!(verdict.reason, Some(SafetyReason::MaxTokensCapped));
        assert_eq!(verdict.adjusted_max_tokens, Some(512));
    }

    #[test]
    fn non_integer_max_tokens_passes_through() {
        for value in [json!(1000.5), json!("4096"), json!(null)] {
            let verdict = filter().check(&request(json!({
                "messages": [{"role": "user", "content": "hello"}],
                "max_tokens": value
            })));
            assert_eq!(verdict, SafetyVerdict::allow());
        }
    }

    #[test]
    fn blocking_wins_over_capping() {
        let verdict = filter().check(&request(json!({
            "messages": [{"role": "user", "content": "hack it"}],
            "max_tokens": 4096
        })));
        assert!(!verdict.allowed);
        assert_eq!(verdict.adjusted_max_tokens, None);
    }

    #[test]
    fn plain_allow() {
        let verdict = filter().check(&request(json!({
            "messages": [{"role": "user", "content": "hello"}],
            "max_tokens": 512
        })));
        assert_eq!(verdict, SafetyVerdict::allow());
    }

    #[test]
    fn empty_denylist_entries_are_ignored() {
        let filter = SafetyFilter::new(512, &[String::new(), "  ".to_string()]);
        let verdict = filter.check(&request(json!({
            "messages": [{"role": "user", "content": "anything"}]
        })));
        assert!(verdict.allowed);
    }
}
