//! AI-assisted editing of Gujarati LaTeX Beamer presentations.
//!
//! The crate is organised around a single [`session::EditSession`]: it owns
//! the canonical document, the tracked selection and the single-flight
//! action state, and merges model output back by offset. The CLI and the
//! GTK frontend are thin shells over it.

pub mod action;
pub mod api;
pub mod config;
pub mod constants;
pub mod document;
pub mod generation;
pub mod media;
pub mod prompts;
pub mod selection;
pub mod session;
pub mod template;
pub mod utils;

#[cfg(feature = "gui")]
pub mod state;
#[cfg(feature = "gui")]
pub mod ui;

#[cfg(test)]
mod test_support;

pub use action::{ActionKind, ActionState, InputMethod};
pub use config::{AppConfig, ProviderConfig};
pub use document::DocumentStore;
pub use generation::{GenerationClient, GenerationError};
pub use media::{MediaAttachment, MediaKind};
pub use session::{run_action, ActionError, EditSession};
