//! Text generation backends for question answering.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use docusec_core::rag::{Prompt, TextGenerator};

use crate::config::LlmConfig;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Generator used when `llm.provider = "disabled"`.
pub struct DisabledGenerator;

impl TextGenerator for DisabledGenerator {
    fn complete(&self, _prompt: &Prompt) -> Result<String> {
        bail!("LLM provider is disabled; set [llm] provider = \"openai\" to answer questions")
    }
}

/// OpenAI chat completions client. Answers are capped at `max_tokens`.
pub struct OpenAIChat {
    model: String,
    max_tokens: u32,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl OpenAIChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_key,
            client,
        })
    }

    fn request_body(&self, prompt: &Prompt) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user},
            ],
        })
    }
}

impl TextGenerator for OpenAIChat {
    fn complete(&self, prompt: &Prompt) -> Result<String> {
        debug!(model = %self.model, "requesting chat completion");
        let response = self
            .client
            .post(OPENAI_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .context("Chat completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }
        let json: serde_json::Value = response.json()?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))
}

pub fn create_generator(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "openai" => Ok(Arc::new(OpenAIChat::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_choice() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "short answer"}}]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "short answer");
        assert!(parse_chat_response(&serde_json::json!({"choices": []})).is_err());
    }

    #[test]
    fn request_carries_token_cap_and_both_messages() {
        let chat = OpenAIChat {
            model: "gpt-4o-mini".into(),
            max_tokens: 2048,
            api_key: "test".into(),
            client: reqwest::blocking::Client::new(),
        };
        let body = chat.request_body(&Prompt {
            system: "ctx".into(),
            user: "q".into(),
        });
        assert_eq!(body["max_tokens"], 2048);
        assert_eq!(body["messages"][0]["content"], "ctx");
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn disabled_generator_errors() {
        let generator = create_generator(&LlmConfig::default()).unwrap();
        let prompt = Prompt {
            system: String::new(),
            user: "q".into(),
        };
        assert!(generator.complete(&prompt).is_err());
    }
}
