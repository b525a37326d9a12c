//! Application-wide constants for beamer-rs.
//!
//! Centralizes timeouts, sampling parameters and provider defaults so the
//! generation layer and the shells agree on them.

use std::time::Duration;

// ============================================================================
// Application Identity
// ============================================================================

/// GTK Application ID following reverse-DNS convention.
pub const APP_ID: &str = "com.github.beamer-rs";

/// Application name displayed in window title.
pub const APP_NAME: &str = "Beamer.rs (Gujarati)";

/// Directory name used under the platform config directory.
pub const CONFIG_DIR_NAME: &str = "beamer-rs";

// ============================================================================
// Window Configuration
// ============================================================================

/// Default window width in pixels.
pub const DEFAULT_WINDOW_WIDTH: i32 = 1280;

/// Default window height in pixels.
pub const DEFAULT_WINDOW_HEIGHT: i32 = 820;

// ============================================================================
// Media Ingestion
// ============================================================================

/// Largest attachment accepted for inline upload (20 MB).
/// Inline media above this size is rejected by the hosted models anyway.
pub const MAX_MEDIA_SIZE_BYTES: usize = 20 * 1024 * 1024;

/// Mime type accepted by the PDF flow.
pub const PDF_MIME_TYPE: &str = "application/pdf";

// ============================================================================
// AI Client
// ============================================================================

/// HTTP request timeout for AI operations.
/// Multimodal generations over a whole deck are slow; keep this generous.
pub const AI_REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Low temperature keeps rewrites close to the source document.
pub const AI_TEMPERATURE: f32 = 0.2;

pub const AI_TOP_P: f32 = 0.9;

pub const AI_SEED: i64 = 42;

/// Environment variable holding the Gemini credential.
pub const DEFAULT_API_KEY_ENV: &str = "API_KEY";

/// Environment variable holding the OpenAI credential.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Marker prefix for missing-credential messages; the UI keys setup help off it.
pub const API_KEY_MISSING_MARKER: &str = "API_KEY_MISSING:";

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o";

pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

pub const OLLAMA_DEFAULT_MODEL: &str = "qwen2.5vl:7b";
