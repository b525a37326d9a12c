//! Adapter between the edit session and the configured model provider.
//!
//! Builds the per-mode prompt, drains the provider stream, cleans the text and
//! folds every provider failure into [`GenerationError`].

use crate::action::ActionKind;
use crate::api::{AiChunk, AiProvider, ApiError};
use crate::constants::API_KEY_MISSING_MARKER;
use crate::media::InlineMedia;
use crate::prompts;
use futures::StreamExt;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// What the user-facing layer sees when a generation fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error(
        "{marker} The API key is not configured. Please ensure the {var} environment variable is set up.",
        marker = API_KEY_MISSING_MARKER
    )]
    ConfigurationMissing { var: String },
    #[error(
        "{marker} {0}. Check the provider in Settings.",
        marker = API_KEY_MISSING_MARKER
    )]
    Configuration(String),
    #[error("Invalid API Key. Please check your API key environment variable.")]
    InvalidCredential,
    #[error("API Quota Exceeded. Please check your API usage and limits.")]
    QuotaExceeded,
    #[error("The AI model encountered an issue processing your request (e.g. safety settings, content policy, model error). Please try a different prompt or modify your content.")]
    ContentPolicyBlocked,
    #[error("Received empty response from AI model. Please try a different prompt or check model output.")]
    EmptyResponse,
    #[error("AI generation failed: {0}")]
    Upstream(String),
    #[error("Request cancelled before the model answered.")]
    Cancelled,
}

impl GenerationError {
    /// Setup problems are shown verbatim so the UI can offer setup help.
    pub fn is_configuration_missing(&self) -> bool {
        matches!(
            self,
            GenerationError::ConfigurationMissing { .. } | GenerationError::Configuration(_)
        )
    }
}

/// Maps a provider failure onto the user-facing taxonomy.
pub fn classify(err: ApiError) -> GenerationError {
    let message = match err {
        ApiError::MissingCredential(var) => return GenerationError::ConfigurationMissing { var },
        ApiError::Config(reason) => return GenerationError::Configuration(reason),
        ApiError::Blocked(reason) => {
            tracing::warn!("Model refused the request: {}", reason);
            return GenerationError::ContentPolicyBlocked;
        }
        ApiError::Status { status, message } => match status {
            401 | 403 => return GenerationError::InvalidCredential,
            429 => return GenerationError::QuotaExceeded,
            _ => message,
        },
        other => other.to_string(),
    };

    let lower = message.to_lowercase();
    if lower.contains("api key not valid")
        || lower.contains("invalid api key")
        || lower.contains("incorrect api key")
    {
        GenerationError::InvalidCredential
    } else if lower.contains("quota") {
        GenerationError::QuotaExceeded
    } else if lower.contains("model_error")
        || lower.contains("candidate error")
        || lower.contains("safety settings")
        || lower.contains("blocked")
    {
        GenerationError::ContentPolicyBlocked
    } else {
        GenerationError::Upstream(message)
    }
}

fn fence_regex() -> &'static Regex {
    static FENCE_REGEX: OnceLock<Regex> = OnceLock::new();
    FENCE_REGEX.get_or_init(|| {
        Regex::new(r"(?s)\A```(?:latex|tex)?[ \t]*\r?\n?(.*?)\r?\n?\s*```\z")
            .expect("fence pattern is valid")
    })
}

/// Trims model output and strips a fence that wraps the whole of it.
///
/// `None` means the model never produced text. An empty result is an error
/// unless `allow_empty` is set (snippet rewrites, where empty means delete).
pub fn clean_response(raw: Option<&str>, allow_empty: bool) -> Result<String, GenerationError> {
    let Some(raw) = raw else {
        tracing::warn!("Received no response text from AI model");
        return Err(GenerationError::EmptyResponse);
    };

    let trimmed = raw.trim();
    let cleaned = match fence_regex().captures(trimmed) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()).trim(),
        None => trimmed,
    };

    if cleaned.is_empty() && !allow_empty {
        tracing::warn!("Received empty response from AI model");
        return Err(GenerationError::EmptyResponse);
    }
    Ok(cleaned.to_string())
}

/// Inputs for one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub kind: ActionKind,
    pub document: String,
    pub instruction: String,
    /// The selected text, for [`ActionKind::SelectionRewrite`] only.
    pub snippet: Option<String>,
    pub media: Option<InlineMedia>,
}

/// Stateless front for a provider.
#[derive(Clone)]
pub struct GenerationClient {
    provider: Arc<dyn AiProvider>,
    system_suffix: Option<String>,
}

impl GenerationClient {
    pub fn new(provider: Arc<dyn AiProvider>) -> Self {
        Self {
            provider,
            system_suffix: None,
        }
    }

    /// Extra guidance appended to every system prompt.
    pub fn with_system_suffix(mut self, suffix: Option<String>) -> Self {
        self.system_suffix = suffix;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub async fn check_availability(&self) -> Result<(), GenerationError> {
        self.provider.check_availability().await.map_err(classify)
    }

    /// Runs one request and returns cleaned LaTeX (a snippet for rewrites).
    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let prompt = prompts::build(request, self.system_suffix.as_deref());
        tracing::info!(
            "Sending {} request to {} ({}), document {} chars",
            request.kind,
            self.provider.name(),
            self.provider.model(),
            request.document.len()
        );

        let mut stream = self.provider.chat_stream(&prompt).await.map_err(|e| {
            tracing::error!("AI Connection Error: {}", e);
            classify(e)
        })?;

        let mut content: Option<String> = None;
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(AiChunk::Content(text)) => {
                    content.get_or_insert_with(String::new).push_str(&text)
                }
                Ok(AiChunk::Reasoning(text)) => tracing::debug!("AI reasoning: {}", text),
                Err(e) => {
                    tracing::error!("AI Stream Error: {}", e);
                    return Err(classify(e));
                }
            }
        }

        clean_response(content.as_deref(), !request.kind.replaces_document())
    }

    pub async fn update_document(
        &self,
        document: &str,
        instruction: &str,
    ) -> Result<String, GenerationError> {
        self.generate(&GenerationRequest {
            kind: ActionKind::WholeDocumentUpdate,
            document: document.to_string(),
            instruction: instruction.to_string(),
            snippet: None,
            media: None,
        })
        .await
    }

    pub async fn rewrite_selection(
        &self,
        snippet: &str,
        document: &str,
        instruction: &str,
    ) -> Result<String, GenerationError> {
        self.generate(&GenerationRequest {
            kind: ActionKind::SelectionRewrite,
            document: document.to_string(),
            instruction: instruction.to_string(),
            snippet: Some(snippet.to_string()),
            media: None,
        })
        .await
    }

    pub async fn generate_from_media(
        &self,
        kind: ActionKind,
        document: &str,
        media: InlineMedia,
        instruction: &str,
    ) -> Result<String, GenerationError> {
        self.generate(&GenerationRequest {
            kind,
            document: document.to_string(),
            instruction: instruction.to_string(),
            snippet: None,
            media: Some(media),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedProvider;

    #[test]
    fn test_clean_response_strips_tagged_fence() {
        assert_eq!(clean_response(Some("```latex\nX\n```"), false).unwrap(), "X");
        assert_eq!(clean_response(Some("```tex\nX\n```"), false).unwrap(), "X");
        assert_eq!(clean_response(Some("  ```\n  X  \n```  "), false).unwrap(), "X");
    }

    #[test]
    fn test_clean_response_is_idempotent() {
        let fenced = "```latex\n\\begin{document}\n\\end{document}\n```";
        let once = clean_response(Some(fenced), false).unwrap();
        let twice = clean_response(Some(&once), false).unwrap();
        assert_eq!(once, twice);
        assert_eq!(clean_response(Some("plain \\LaTeX"), false).unwrap(), "plain \\LaTeX");
    }

    #[test]
    fn test_clean_response_leaves_inner_fences_alone() {
        let text = "Here you go:\n```latex\nX\n```\nThanks";
        assert_eq!(clean_response(Some(text), false).unwrap(), text);
    }

    #[test]
    fn test_clean_response_empty_handling() {
        let empty = Err(GenerationError::EmptyResponse);
        assert_eq!(clean_response(None, false), empty);
        assert_eq!(clean_response(None, true), empty);
        assert_eq!(clean_response(Some("   "), false), empty);
        assert_eq!(
            clean_response(Some("```latex\n```"), false),
            Err(GenerationError::EmptyResponse)
        );
        assert_eq!(clean_response(Some(" \n "), true).unwrap(), "");
        assert_eq!(clean_response(Some("```latex\n```"), true).unwrap(), "");
    }

    #[test]
    fn test_classify_taxonomy() {
        assert_eq!(
            classify(ApiError::MissingCredential("API_KEY".into())),
            GenerationError::ConfigurationMissing { var: "API_KEY".into() }
        );
        assert_eq!(
            classify(ApiError::Status {
                status: 400,
                message: "API key not valid. Please pass a valid API key.".into()
            }),
            GenerationError::InvalidCredential
        );
        assert_eq!(
            classify(ApiError::Status {
                status: 401,
                message: "nope".into()
            }),
            GenerationError::InvalidCredential
        );
        assert_eq!(
            classify(ApiError::Status {
                status: 429,
                message: "slow".into()
            }),
            GenerationError::QuotaExceeded
        );
        assert_eq!(
            classify(ApiError::Response("Resource exhausted: check quota".into())),
            GenerationError::QuotaExceeded
        );
        assert_eq!(
            classify(ApiError::Blocked("SAFETY".into())),
            GenerationError::ContentPolicyBlocked
        );
        assert_eq!(
            classify(ApiError::Response("Candidate error: blocked by safety settings".into())),
            GenerationError::ContentPolicyBlocked
        );
        assert_eq!(
            classify(ApiError::Status {
                status: 500,
                message: "backend down".into()
            }),
            GenerationError::Upstream("backend down".into())
        );
        assert_eq!(
            classify(ApiError::Config(
                "No API key environment variable configured for this provider".into()
            )),
            GenerationError::Configuration(
                "No API key environment variable configured for this provider".into()
            )
        );
    }

    #[test]
    fn test_provider_setup_error_is_shown_as_configuration() {
        let err = classify(ApiError::Config(
            "Ollama cannot read application/pdf attachments".into(),
        ));
        assert!(err.is_configuration_missing());
        assert!(err.to_string().starts_with(API_KEY_MISSING_MARKER));
        assert!(err.to_string().contains("application/pdf"));
    }

    #[test]
    fn test_configuration_missing_message_has_marker() {
        let err = GenerationError::ConfigurationMissing { var: "API_KEY".into() };
        assert!(err.is_configuration_missing());
        assert!(err.to_string().starts_with(API_KEY_MISSING_MARKER));
        assert!(err.to_string().contains("API_KEY environment variable"));
    }

    #[tokio::test]
    async fn test_generate_concatenates_stream_and_cleans() {
        let provider = Arc::new(
            ScriptedProvider::new().reply_chunks(&["```latex\n\\begin{doc", "ument}\n```"]),
        );
        let client = GenerationClient::new(provider.clone());
        let out = client.update_document("old", "make it new").await.unwrap();
        assert_eq!(out, "\\begin{document}");

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].user.contains("make it new"));
        assert!(calls[0].media.is_none());
    }

    #[tokio::test]
    async fn test_generate_rewrite_allows_empty_snippet() {
        let provider = Arc::new(ScriptedProvider::new().reply(""));
        let client = GenerationClient::new(provider);
        let snippet = client
            .rewrite_selection("OLD", "doc OLD", "delete this")
            .await
            .unwrap();
        assert_eq!(snippet, "");
    }

    #[tokio::test]
    async fn test_generate_update_rejects_empty() {
        let provider = Arc::new(ScriptedProvider::new().reply("   "));
        let client = GenerationClient::new(provider);
        assert_eq!(
            client.update_document("doc", "x").await,
            Err(GenerationError::EmptyResponse)
        );
    }

    #[tokio::test]
    async fn test_generate_media_passes_payload() {
        let provider = Arc::new(ScriptedProvider::new().reply("\\documentclass{beamer}"));
        let client = GenerationClient::new(provider.clone());
        let media = InlineMedia {
            mime_type: "image/png".into(),
            data: "AAAA".into(),
        };
        client
            .generate_from_media(ActionKind::ImageGeneration, "doc", media.clone(), "")
            .await
            .unwrap();
        assert_eq!(provider.calls()[0].media, Some(media));
    }

    #[tokio::test]
    async fn test_generate_classifies_provider_errors() {
        let provider = Arc::new(
            ScriptedProvider::new().fail(ApiError::Response("quota exceeded for project".into())),
        );
        let client = GenerationClient::new(provider);
        assert_eq!(
            client.update_document("doc", "x").await,
            Err(GenerationError::QuotaExceeded)
        );
    }

    #[tokio::test]
    async fn test_generate_mid_stream_error() {
        let provider = Arc::new(ScriptedProvider::new().reply_then_fail(
            "partial",
            ApiError::Stream("connection reset".into()),
        ));
        let client = GenerationClient::new(provider);
        let err = client.update_document("doc", "x").await.unwrap_err();
        assert!(matches!(err, GenerationError::Upstream(m) if m.contains("connection reset")));
    }
}
