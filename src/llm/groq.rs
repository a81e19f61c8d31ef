use anyhow::{Context, Result};
use futures_util::StreamExt;
use log::debug;
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::generation::CompletionClient;

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

#[derive(Debug, Clone)]
pub struct GroqClient {
    client: reqwest::Client,
    api_key: String,
    pub model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// Streaming response chunk
#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

impl GroqClient {
    /// Available models on Groq
    pub const MODELS: &'static [(&'static str, &'static str)] = &[
        ("llama-3.3-70b-versatile", "Llama 3.3 70B - Best quiz quality"),
        ("openai/gpt-oss-120b", "GPT-OSS 120B - Most powerful"),
        ("llama-3.1-8b-instant", "Llama 3.1 8B - Fast and cheap"),
        ("gemma2-9b-it", "Gemma 2 9B - Google's model"),
    ];

    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    async fn send(&self, request: &ChatRequest) -> Result<reqwest::Response> {
        debug!(
            "POST {} model={} messages={} stream={}",
            GROQ_API_URL,
            request.model,
            request.messages.len(),
            request.stream
        );

        let response = self
            .client
            .post(GROQ_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .context("Failed to send request to Groq")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Groq API error ({}): {}", status, text);
        }

        Ok(response)
    }

    /// Send a chat request and wait for the whole reply, asking for JSON output
    pub async fn chat_json(&self, messages: &[Message]) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            temperature: Some(0.4),
            max_tokens: Some(8192),
            response_format: Some(ResponseFormat {
                kind: "json_object",
            }),
            stream: false,
        };

        let chat_response: ChatResponse = self
            .send(&request)
            .await?
            .json()
            .await
            .context("Failed to parse Groq response")?;

        chat_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .context("No response from Groq")
    }

    /// Send a chat message with streaming response
    /// Prints tokens as they arrive and returns the complete response
    pub async fn chat_stream(&self, messages: &[Message]) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            temperature: Some(0.7),
            max_tokens: Some(1024),
            response_format: None,
            stream: true,
        };

        let response = self.send(&request).await?;

        let mut full_response = String::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.context("Failed to read stream chunk")?;
            let chunk_str = String::from_utf8_lossy(&chunk);

            // SSE format: "data: {...}\n\n"
            for line in chunk_str.lines() {
                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                if data == "[DONE]" {
                    break;
                }

                if let Ok(parsed) = serde_json::from_str::<StreamChunk>(data)
                    && let Some(content) = parsed.choices.first().and_then(|c| c.delta.content.as_ref())
                {
                    print!("{}", content);
                    std::io::stdout().flush().ok();
                    full_response.push_str(content);
                }
            }
        }

        println!();

        Ok(full_response)
    }
}

impl CompletionClient for GroqClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        self.chat_json(messages).await
    }
}
