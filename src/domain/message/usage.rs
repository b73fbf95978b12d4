use serde::{Deserialize, Serialize};

/// Token accounting for one LLM call, in the single shape the bus stores
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    /// Builds a record whose total is the sum of both sides
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Usage as reported by a provider, before normalization
///
/// Accepts OpenAI-style (`prompt_tokens`), camelCase (`promptTokens`) and
/// Anthropic-style (`input_tokens`) vocabularies. Convert with
/// [`RawUsage::normalize`] before attaching to a message.
///
/// # Example
/// ```
/// use agent_bus::domain::message::RawUsage;
///
/// let raw: RawUsage = serde_json::from_str(r#"{"input_tokens": 12, "output_tokens": 30}"#).unwrap();
/// let usage = raw.normalize();
/// assert_eq!(usage.total_tokens, 42);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawUsage {
    #[serde(default, alias = "promptTokens")]
    pub prompt_tokens: Option<u64>,
    #[serde(default, alias = "completionTokens")]
    pub completion_tokens: Option<u64>,
    #[serde(default, alias = "totalTokens")]
    pub total_tokens: Option<u64>,
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
}

impl RawUsage {
    /// Reconciles the provider vocabulary into a [`Usage`]
    ///
    /// Missing counts are zero; a missing total is the sum of both sides.
    pub fn normalize(&self) -> Usage {
        let prompt_tokens = self.prompt_tokens.or(self.input_tokens).unwrap_or(0);
        let completion_tokens = self
            .completion_tokens
            .or(self.output_tokens)
            .unwrap_or(0);
        let total_tokens = self
            .total_tokens
            .unwrap_or_else(|| prompt_tokens.saturating_add(completion_tokens));

        Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
    }
}

impl From<RawUsage> for Usage {
    fn from(raw: RawUsage) -> Self {
        raw.normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Usage {
        serde_json::from_str::<RawUsage>(json).unwrap().normalize()
    }

    #[test]
    fn openai_vocabulary() {
        let usage = parse(r#"{"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}"#);
        assert_eq!(usage, Usage::new(10, 5));
    }

    #[test]
    fn camel_case_vocabulary() {
        let usage = parse(r#"{"promptTokens": 3, "completionTokens": 4, "totalTokens": 7}"#);
        assert_eq!(usage, Usage::new(3, 4));
    }

    #[test]
    fn anthropic_vocabulary_computes_total() {
        let usage = parse(r#"{"input_tokens": 20, "output_tokens": 22}"#);
        assert_eq!(usage.prompt_tokens, 20);
        assert_eq!(usage.completion_tokens, 22);
        assert_eq!(usage.total_tokens, 42);
    }

    #[test]
    fn reported_total_wins() {
        let usage = parse(r#"{"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 9}"#);
        assert_eq!(usage.total_tokens, 9);
    }

    #[test]
    fn oversized_counts_saturate() {
        let usage = parse(r#"{"input_tokens": 18446744073709551615, "output_tokens": 1}"#);
        assert_eq!(usage.prompt_tokens, u64::MAX);
        assert_eq!(usage.completion_tokens, 1);
        assert_eq!(usage.total_tokens, u64::MAX);
        assert_eq!(Usage::new(u64::MAX, 5).total_tokens, u64::MAX);
    }

    #[test]
    fn empty_object_is_zero() {
        assert_eq!(parse("{}"), Usage::default());
    }
}
