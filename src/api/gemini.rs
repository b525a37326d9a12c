use crate::api::stream::{lines, sse_data};
use crate::api::{check_status, resolve_api_key, AiChunk, AiProvider, AiStream, ApiError, Prompt};
use crate::constants::{AI_REQUEST_TIMEOUT, AI_SEED, AI_TEMPERATURE, AI_TOP_P};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

/// Finish reasons that mean the model refused or filtered the output.
const BLOCKING_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

/// Google Gemini over the `generativelanguage` REST API.
///
/// The only provider here that takes both images and PDFs as inline parts.
pub struct GeminiProvider {
    client: Client,
    pub model: String,
    pub base_url: String,
    pub api_key_env: Option<String>,
}

impl GeminiProvider {
    pub fn new(model: String, base_url: String, api_key_env: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(AI_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            model,
            base_url,
            api_key_env,
        }
    }

    fn request_body(prompt: &Prompt) -> Value {
        let mut parts = vec![json!({ "text": prompt.user })];
        if let Some(media) = &prompt.media {
            parts.push(json!({
                "inlineData": {
                    "mimeType": media.mime_type,
                    "data": media.data,
                }
            }));
        }
        json!({
            "systemInstruction": { "parts": [{ "text": prompt.system }] },
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "temperature": AI_TEMPERATURE,
                "topP": AI_TOP_P,
                "seed": AI_SEED
            }
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

/// Decodes one SSE event into chunks.
///
/// A finished candidate with no text yields an explicit empty `Content` so the
/// caller can tell "answered with nothing" from "never answered".
fn parse_event(json_str: &str) -> Vec<Result<AiChunk, ApiError>> {
    let chunk: GeminiChunk = match serde_json::from_str(json_str) {
        Ok(chunk) => chunk,
        Err(e) => {
            return vec![Err(ApiError::Stream(format!(
                "Failed to parse Gemini chunk: {}",
                e
            )))]
        }
    };

    if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
        return vec![Err(ApiError::Blocked(format!("prompt blocked ({})", reason)))];
    }

    let Some(candidate) = chunk.candidates.into_iter().next() else {
        return Vec::new();
    };

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if BLOCKING_FINISH_REASONS.contains(&reason) {
            return vec![Err(ApiError::Blocked(format!(
                "candidate finished with {}",
                reason
            )))];
        }
    }

    let mut out = Vec::new();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(text) = part.text {
            if part.thought {
                out.push(Ok(AiChunk::Reasoning(text)));
            } else {
                out.push(Ok(AiChunk::Content(text)));
            }
        }
    }
    if out.is_empty() && candidate.finish_reason.is_some() {
        out.push(Ok(AiChunk::Content(String::new())));
    }
    out
}

#[async_trait]
impl AiProvider for GeminiProvider {
    fn name(&self) -> &str {
        "Gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn check_availability(&self) -> Result<(), ApiError> {
        let key = resolve_api_key(self.api_key_env.as_deref())?;
        let url = format!("{}/models/{}", self.base_url, self.model);
        let response = self
            .client
            .get(url)
            .header("x-goog-api-key", key)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn chat_stream(&self, prompt: &Prompt) -> Result<AiStream, ApiError> {
        let key = resolve_api_key(self.api_key_env.as_deref())?;
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", key)
            .json(&Self::request_body(prompt))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::InlineMedia;

    fn contents(chunks: Vec<Result<AiChunk, ApiError>>) -> Vec<AiChunk> {
        chunks.into_iter().map(|c| c.unwrap()).collect()
    }

    #[test]
    fn test_request_body_with_inline_media() {
        let prompt = Prompt {
            system: "sys".into(),
            user: "usr".into(),
            media: Some(InlineMedia {
                mime_type: "application/pdf".into(),
                data: "JVBERg==".into(),
            }),
        };
        let body = GeminiProvider::request_body(&prompt);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "usr");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "application/pdf");
        assert_eq!(parts[1]["inlineData"]["data"], "JVBERg==");
    }

    #[test]
    fn test_parse_event_text_and_thoughts() {
        let event = r#"{"candidates":[{"content":{"parts":[{"text":"plan","thought":true},{"text":"\\guj{x}"}]}}]}"#;
        assert_eq!(
            contents(parse_event(event)),
            vec![
                AiChunk::Reasoning("plan".into()),
                AiChunk::Content("\\guj{x}".into())
            ]
        );
    }

    #[test]
    fn test_parse_event_blocked_prompt() {
        let event = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let out = parse_event(event);
        assert!(matches!(out.as_slice(), [Err(ApiError::Blocked(_))]));
    }

    #[test]
    fn test_parse_event_safety_finish() {
        let event = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        assert!(matches!(parse_event(event).as_slice(), [Err(ApiError::Blocked(_))]));
    }

    #[test]
    fn test_parse_event_finished_without_text_is_explicit_empty() {
        let event = r#"{"candidates":[{"content":{"role":"model"},"finishReason":"STOP"}]}"#;
        assert_eq!(contents(parse_event(event)), vec![AiChunk::Content(String::new())]);
    }

    #[test]
    fn test_parse_event_garbage() {
        assert!(matches!(parse_event("{not json").as_slice(), [Err(ApiError::Stream(_))]));
    }
}
