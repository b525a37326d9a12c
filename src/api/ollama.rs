use crate::api::stream::lines;
use crate::api::{check_status, AiChunk, AiProvider, AiStream, ApiError, Prompt};
use crate::constants::{AI_REQUEST_TIMEOUT, AI_SEED, AI_TEMPERATURE, AI_TOP_P};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

/// Local Ollama server. Vision models accept images; PDFs are not supported.
pub struct OllamaProvider {
    client: Client,
    pub model: String,
    pub base_url: String,
}

impl OllamaProvider {
    pub fn new(model: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(AI_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            model,
            base_url,
        }
    }

    fn request_body(&self, prompt: &Prompt) -> Result<Value, ApiError> {
        let mut user = json!({ "role": "user", "content": prompt.user });
        if let Some(media) = &prompt.media {
            if !media.mime_type.starts_with("image/") {
                return Err(ApiError::Config(format!(
                    "Ollama cannot read {} attachments; switch to a Gemini or OpenAI provider",
                    media.mime_type
                )));
            }
            user["images"] = json!([media.data]);
        }
        Ok(json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompt.system },
                user
            ],
            "stream": true,
            "options": {
                "temperature": AI_TEMPERATURE,
                "top_p": AI_TOP_P,
                "seed": AI_SEED
            }
        }))
    }
}

#[derive(Deserialize)]
struct OllamaChatChunk {
    message: Option<OllamaMessage>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
    thinking: Option<String>,
}

#[derive(Deserialize)]
struct OllamaTags {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

fn parse_line(line: &str) -> Vec<Result<AiChunk, ApiError>> {
    if line.trim().is_empty() {
        return Vec::new();
    }
    let chunk: OllamaChatChunk = match serde_json::from_str(line) {
        Ok(chunk) => chunk,
        Err(e) => {
            return vec![Err(ApiError::Stream(format!(
                "Failed to parse Ollama chunk: {}",
                e
            )))]
        }
    };
    if let Some(error) = chunk.error {
        return vec![Err(ApiError::Response(error))];
    }
    let mut out = Vec::new();
    if let Some(message) = chunk.message {
        if let Some(thinking) = message.thinking.filter(|t| !t.is_empty()) {
            out.push(Ok(AiChunk::Reasoning(thinking)));
        }
        out.push(Ok(AiChunk::Content(message.content)));
    }
    out
}

#[async_trait]
impl AiProvider for OllamaProvider {
    fn name(&self) -> &str {
        "Ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn check_availability(&self) -> Result<(), ApiError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = check_status(self.client.get(url).send().await?).await?;

        let tags: OllamaTags = response.json().await?;
        if tags
            .models
            .iter()
            .any(|m| m.name == self.model || m.name.starts_with(&format!("{}:", self.model)))
        {
            Ok(())
        } else {
            Err(ApiError::Response(format!(
                "Model {} not found in Ollama",
                self.model
            )))
        }
    }

    async fn chat_stream(&self, prompt: &Prompt) -> Result<AiStream, ApiError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = self.request_body(prompt)?;
        let response = check_status(self.client.post(url).json(&body).send().await?).await?;

        let stream = lines(response.bytes_stream())
            .map(|line| match line {
                Ok(line) => futures::stream::iter(parse_line(&line)),
                Err(e) => futures::stream::iter(vec![Err(e)]),
            })
            .flatten();

        Ok(Box::pin(stream))
    }
}
