use std::time::Duration;

use async_trait::async_trait;
use fluency_core::{ChatMessage, GenerationParams, LLMProvider, LLMResponse, SpeechToText};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde_json::json;
use tracing::info;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-large-v3-turbo";

/// Client for Groq's OpenAI-compatible chat and transcription endpoints.
///
/// No retries: a failed request fails the turn.
pub struct GroqProvider {
    client: Client,
    api_key: String,
    base_url: String,
    transcription_model: String,
}

impl GroqProvider {
    pub fn new(api_key: String, timeout: Duration) -> anyhow::Result<Self> {
        info!("Creating GroqProvider");
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_transcription_model(mut self, model: String) -> Self {
        self.transcription_model = model;
        self
    }

    async fn try_send(&self, request: &serde_json::Value) -> anyhow::Result<LLMResponse> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        parse_chat_response(&response)
    }
}

/// Extract the reply and token usage from a chat-completions body.
pub fn parse_chat_response(response: &serde_json::Value) -> anyhow::Result<LLMResponse> {
    let content = response["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid response format: missing content"))?
        .to_string();

    let usage = response["usage"].as_object().map(|u| fluency_core::Usage {
        prompt_tokens: u32::try_from(u["prompt_tokens"].as_u64().unwrap_or(0)).unwrap_or(0),
        completion_tokens: u32::try_from(u["completion_tokens"].as_u64().unwrap_or(0))
            .unwrap_or(0),
        total_tokens: u32::try_from(u["total_tokens"].as_u64().unwrap_or(0)).unwrap_or(0),
    });

    Ok(LLMResponse { content, usage })
}

/// Extract the transcript from a JSON transcription body.
pub fn parse_transcription_response(response: &serde_json::Value) -> anyhow::Result<String> {
    response["text"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid transcription format: missing text"))
}

fn mime_for(file_name: &str) -> &'static str {
    fluency_core::AudioFormat::from_file_name(file_name).mime_type()
}

#[async_trait]
impl LLMProvider for GroqProvider {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> anyhow::Result<LLMResponse> {
        let request = json!({
            "model": params.model,
            "messages": messages,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });

        info!("Sending request to Groq API: model={}", params.model);
        let response = self.try_send(&request).await?;
        info!("Received response from Groq API");
        Ok(response)
    }
}

#[async_trait]
impl SpeechToText for GroqProvider {
    async fn transcribe(
        &self,
        audio: &[u8],
        file_name: &str,
        language: &str,
    ) -> anyhow::Result<String> {
        let part = Part::bytes(audio.to_vec())
            .file_name(file_name.to_string())
            .mime_str(mime_for(file_name))?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.transcription_model.clone())
            .text("response_format", "json")
            .text("language", language.to_string());

        info!(
            "Sending transcription to Groq API: model={}, bytes={}",
            self.transcription_model,
            audio.len()
        );

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json::<serde_json::Value>()
            .await?;

        parse_transcription_response(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    fn parses_chat_completion() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "Let's breathe together."}}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 8, "total_tokens": 128}
        });

        let response = parse_chat_response(&body).expect("parse");
        assert_eq!(response.content, "Let's breathe together.");
        let usage = response.usage.expect("usage");
        assert_eq!(usage.total_tokens, 128);
    }

    #[test]
    fn missing_content_is_an_error() {
        let body = json!({"choices": []});
        assert!(parse_chat_response(&body).is_err());
    }

    #[test]
    fn parses_transcription_text() {
        assert_eq!(
            parse_transcription_response(&json!({"text": " Hi, I'm Sam"})).ok(),
            Some(" Hi, I'm Sam".to_string())
        );
        assert_eq!(
            parse_transcription_response(&json!({"text": ""})).ok(),
            Some(String::new())
        );
        assert!(parse_transcription_response(&json!({"error": "bad"})).is_err());
    }

    #[test]
    fn upload_mime_follows_extension() {
        assert_eq!(mime_for("fluency-abc.webm"), "audio/webm");
        assert_eq!(mime_for("clip.wav"), "audio/wav");
    }
}
