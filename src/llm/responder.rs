//! LLM-backed `ResponseGenerator`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::{LlmConfig, LlmProvider};
use super::{GenerationError, ResponseGenerator};

/// Generates responses with an Ollama or OpenAI-compatible model.
pub struct LlmResponder {
    config: LlmConfig,
    client: Client,
}

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl LlmResponder {
    pub fn new(config: LlmConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| GenerationError::Connection(e.to_string()))?;

        Ok(Self { config, client })
    }

    async fn call_ollama(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = OllamaRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Api(format!("HTTP {}: {}", status, body)));
        }

        let body: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;
        Ok(body.response)
    }

    async fn call_openai(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = format!(
            "{}/v1/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );
        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = self.config.api_key.as_deref() {
            builder = builder.bearer_auth(key);
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| GenerationError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Api(format!("HTTP {}: {}", status, body)));
        }

        let body: ChatResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::Parse("no choices in response".to_string()))
    }
}

#[async_trait]
impl ResponseGenerator for LlmResponder {
    async fn generate(&self, reply_text: &str) -> Result<String, GenerationError> {
        let prompt = self.config.prompt_template().replace("{reply}", reply_text);

        debug!(model = %self.config.model, "Generating response");
        let raw = match self.config.provider {
            LlmProvider::Ollama => self.call_ollama(&prompt).await?,
            LlmProvider::OpenAI => self.call_openai(&prompt).await?,
        };

        clean_response(&raw, self.config.max_response_chars).ok_or(GenerationError::Empty)
    }
}

/// Trim, drop wrapping quotes, and cap at `max_chars` characters.
fn clean_response(raw: &str, max_chars: usize) -> Option<String> {
    let mut text = raw.trim();
    for (open, close) in [('"', '"'), ('\u{201c}', '\u{201d}'), ('\'', '\'')] {
        if text.len() >= 2 && text.starts_with(open) && text.ends_with(close) {
            text = text[open.len_utf8()..text.len() - close.len_utf8()].trim();
            break;
        }
    }
    if text.is_empty() {
        return None;
    }

    let end = text
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    Some(text[..end].trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_response_strips_quotes_and_whitespace() {
        assert_eq!(clean_response("  \"Quack back!\" \n", 280).as_deref(), Some("Quack back!"));
        assert_eq!(clean_response("\u{201c}Hello\u{201d}", 280).as_deref(), Some("Hello"));
        assert_eq!(clean_response("it's fine", 280).as_deref(), Some("it's fine"));
    }

    #[test]
    fn test_clean_response_rejects_empty() {
        assert_eq!(clean_response("   ", 280), None);
        assert_eq!(clean_response("\"\"", 280), None);
    }

    #[test]
    fn test_clean_response_truncates_on_char_boundary() {
        let long = "é".repeat(300);
        let cleaned = clean_response(&long, 280).unwrap();
        assert_eq!(cleaned.chars().count(), 280);
    }

    #[test]
    fn test_chat_response_decoding() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"hi there"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hi there"));
    }
}
