//! Model configuration and related enums.

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Model selection and sampling knobs carried by a session.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[builder(into)]
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

impl ModelConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: None,
            temperature: None,
        }
    }
}

/// Why an inference turn finished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    MaxTokens,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn finish_reason_round_trips_through_strings() {
        assert_eq!(FinishReason::ToolCalls.to_string(), "tool_calls");
        assert_eq!(
            FinishReason::from_str("max_tokens").ok(),
            Some(FinishReason::MaxTokens)
        );
    }

    #[test]
    fn builder_sets_optional_knobs() {
        let config = ModelConfig::builder()
            .model("gpt-4o-mini")
            .temperature(0.2)
            .build();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.temperature, Some(0.2));
        assert_eq!(config.max_tokens, None);
    }
}
