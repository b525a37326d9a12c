use crate::config::ProviderConfig;
use crate::media::InlineMedia;
use async_trait::async_trait;
use futures::Stream;
use serde::Deserialize;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

pub mod gemini;
pub mod ollama;
pub mod openai_compat;
mod stream;

use crate::api::gemini::GeminiProvider;
use crate::api::ollama::OllamaProvider;
use crate::api::openai_compat::OpenAiCompatibleProvider;

/// Everything a provider needs for one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub media: Option<InlineMedia>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    Status { status: u16, message: String },
    #[error("API response error: {0}")]
    Response(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Environment variable {0} is not set")]
    MissingCredential(String),
    #[error("Request blocked: {0}")]
    Blocked(String),
    #[error("Stream error: {0}")]
    Stream(String),
}

pub type AiStream = Pin<Box<dyn Stream<Item = Result<AiChunk, ApiError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiChunk {
    Content(String),
    Reasoning(String),
}

#[async_trait]
pub trait AiProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    async fn chat_stream(&self, prompt: &Prompt) -> Result<AiStream, ApiError>;
    async fn check_availability(&self) -> Result<(), ApiError>;
}

pub fn create_provider(config: &ProviderConfig) -> Arc<dyn AiProvider> {
    match config.name.as_str() {
        "Gemini" => Arc::new(GeminiProvider::new(
            config.active_model.clone(),
            config.base_url.clone(),
            config.api_key_env.clone(),
        )),
        "Ollama" => Arc::new(OllamaProvider::new(
            config.active_model.clone(),
            config.base_url.clone(),
        )),
        _ => Arc::new(OpenAiCompatibleProvider::new(
            config.name.clone(),
            config.active_model.clone(),
            config.base_url.clone(),
            config.api_key_env.clone(),
        )),
    }
}

/// Reads the credential at call time so a key exported after start-up is picked up.
pub(crate) fn resolve_api_key(var: Option<&str>) -> Result<String, ApiError> {
    let Some(var) = var else {
        return Err(ApiError::Config(
            "No API key environment variable configured for this provider".to_string(),
        ));
    };
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(ApiError::MissingCredential(var.to_string())),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Nested { error: ErrorDetail },
    Flat { error: String },
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Pulls the human-readable message out of an error body, falling back to the raw text.
pub(crate) fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody::Nested { error }) => error.message,
        Ok(ErrorBody::Flat { error }) => error,
        Err(_) => body.trim().to_string(),
    }
}

/// Turns a non-2xx response into [`ApiError::Status`].
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn test_api_error_display() {
        let err = ApiError::Response("test error".to_string());
        assert_eq!(format!("{}", err), "API response error: test error");
        let err = ApiError::Status {
            status: 429,
            message: "slow down".into(),
        };
        assert_eq!(err.to_string(), "API error (429): slow down");
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#),
            "API key not valid."
        );
        assert_eq!(error_message(r#"{"error":"model not found"}"#), "model not found");
        assert_eq!(error_message("  upstream exploded \n"), "upstream exploded");
    }

    #[test]
    fn test_resolve_api_key_missing() {
        let err = resolve_api_key(Some("BEAMER_RS_TEST_UNSET_KEY_7f3a")).unwrap_err();
        assert!(matches!(err, ApiError::MissingCredential(ref var) if var == "BEAMER_RS_TEST_UNSET_KEY_7f3a"));
        assert!(matches!(resolve_api_key(None), Err(ApiError::Config(_))));
    }

    #[test]
    fn test_resolve_api_key_present() {
        std::env::set_var("BEAMER_RS_TEST_SET_KEY_91c2", "secret");
        assert_eq!(resolve_api_key(Some("BEAMER_RS_TEST_SET_KEY_91c2")).unwrap(), "secret");
        std::env::set_var("BEAMER_RS_TEST_BLANK_KEY_91c2", "   ");
        assert!(resolve_api_key(Some("BEAMER_RS_TEST_BLANK_KEY_91c2")).is_err());
    }

    #[test]
    fn test_create_provider_dispatch() {
        let config = AppConfig::default();
        let names: Vec<String> = config
            .providers
            .iter()
            .map(|p| create_provider(p).name().to_string())
            .collect();
        assert_eq!(names, vec!["Gemini", "OpenAI", "Ollama"]);
    }
}
