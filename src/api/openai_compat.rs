use crate::api::stream::{lines, sse_data};
use crate::api::{check_status, resolve_api_key, AiChunk, AiProvider, AiStream, ApiError, Prompt};
use crate::constants::{AI_REQUEST_TIMEOUT, AI_SEED, AI_TEMPERATURE, AI_TOP_P, PDF_MIME_TYPE};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

pub struct OpenAiCompatibleProvider {
    client: Client,
    pub name: String,
    pub model: String,
    pub base_url: String,
    pub api_key_env: Option<String>,
}

impl OpenAiCompatibleProvider {
    pub fn new(name: String, model: String, base_url: String, api_key_env: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(AI_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            name,
            model,
            base_url,
            api_key_env,
        }
    }

    fn user_content(prompt: &Prompt) -> Value {
        let Some(media) = &prompt.media else {
            return Value::String(prompt.user.clone());
        };
        let attachment = if media.mime_type == PDF_MIME_TYPE {
            json!({
                "type": "file",
                "file": { "filename": "document.pdf", "file_data": media.data_uri() }
            })
        } else {
            json!({
                "type": "image_url",
                "image_url": { "url": media.data_uri() }
            })
        };
        json!([{ "type": "text", "text": prompt.user }, attachment])
    }

    fn request_body(&self, prompt: &Prompt) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": Self::user_content(prompt) }
            ],
            "stream": true,
            "temperature": AI_TEMPERATURE,
            "top_p": AI_TOP_P,
            "seed": AI_SEED
        })
    }
}

#[derive(Deserialize)]
struct OpenAiStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    error: Option<OpenAiStreamError>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: Option<OpenAiDelta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
    reasoning_content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiStreamError {
    message: String,
}

fn parse_event(data: &str) -> Vec<Result<AiChunk, ApiError>> {
    if data == "[DONE]" {
        return Vec::new();
    }
    let chunk: OpenAiStreamResponse = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::debug!("Skipping unparseable stream event: {}", e);
            return Vec::new();
        }
    };
    if let Some(error) = chunk.error {
        return vec![Err(ApiError::Response(error.message))];
    }

    let mut chunks = Vec::new();
    if let Some(choice) = chunk.choices.into_iter().next() {
        if choice.finish_reason.as_deref() == Some("content_filter") {
            return vec![Err(ApiError::Blocked("content_filter".to_string()))];
        }
        if let Some(delta) = choice.delta {
            if let Some(reasoning) = delta.reasoning_content {
                chunks.push(Ok(AiChunk::Reasoning(reasoning)));
            }
            if let Some(content) = delta.content {
                chunks.push(Ok(AiChunk::Content(content)));
            }
        }
    }
    chunks
}

#[async_trait]
impl AiProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn check_availability(&self) -> Result<(), ApiError> {
        let key = resolve_api_key(self.api_key_env.as_deref())?;
        let url = format!("{}/models", self.base_url);
        let response = self.client.get(url).bearer_auth(key).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn chat_stream(&self, prompt: &Prompt) -> Result<AiStream, ApiError> {
        let key = resolve_api_key(self.api_key_env.as_deref())?;
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(url)
            .bearer_auth(key)
            .json(&self.request_body(prompt))
            .send()
            .await?;
        let response = check_status(response).await?;

        let stream = lines(response.bytes_stream())
            .map(|line| match line {
                Ok(line) => match sse_data(&line) {
                    Some(data) => futures::stream::iter(parse_event(data)),
                    None => futures::stream::iter(Vec::new()),
                },
                Err(e) => futures::stream::iter(vec![Err(e)]),
            })
            .flatten();

        Ok(Box::pin(stream))
    }
}
