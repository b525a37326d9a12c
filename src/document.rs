//! The canonical LaTeX document and the offset helpers used to splice into it.
//!
//! Offsets throughout the crate count Unicode scalar values (`char`s), not
//! bytes. Gujarati text is multi-byte in UTF-8, so every slice goes through
//! [`char_to_byte`] before touching the underlying `String`.

use std::sync::Arc;
use tokio::sync::watch;

/// A published view of the document at one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    pub version: u64,
    pub text: Arc<str>,
}

/// Owns the single canonical document string.
///
/// [`DocumentStore::set_document`] is the only mutation primitive. Every write
/// bumps the version and is broadcast to subscribers, so a view that fell
/// behind always converges on the latest value.
pub struct DocumentStore {
    text: String,
    version: u64,
    notifier: watch::Sender<DocumentSnapshot>,
}

impl DocumentStore {
    pub fn new(initial: impl Into<String>) -> Self {
        let text = initial.into();
        let (notifier, _) = watch::channel(DocumentSnapshot {
            version: 0,
            text: Arc::from(text.as_str()),
        });
        Self {
            text,
            version: 0,
            notifier,
        }
    }

    pub fn document(&self) -> &str {
        &self.text
    }

    /// Monotonic write counter. Pending actions compare against it before merging.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Length of the document in chars.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Replaces the document unconditionally (last writer wins) and returns the new version.
    pub fn set_document(&mut self, text: impl Into<String>) -> u64 {
        self.text = text.into();
        self.version += 1;
        self.notifier.send_replace(DocumentSnapshot {
            version: self.version,
            text: Arc::from(self.text.as_str()),
        });
        tracing::debug!(
            version = self.version,
            chars = self.text.len(),
            "Document replaced"
        );
        self.version
    }

    /// Subscribes a view to document changes.
    pub fn subscribe(&self) -> watch::Receiver<DocumentSnapshot> {
        self.notifier.subscribe()
    }
}

/// Maps a char offset to a byte offset. `char_idx == len` maps to the end of the string.
pub fn char_to_byte(text: &str, char_idx: usize) -> Option<usize> {
    text.char_indices()
        .map(|(byte, _)| byte)
        .chain(std::iter::once(text.len()))
        .nth(char_idx)
}

/// Borrows `text[start..end]` in char offsets.
pub fn slice_chars(text: &str, start: usize, end: usize) -> Option<&str> {
    if start > end {
        return None;
    }
    let from = char_to_byte(text, start)?;
    let to = char_to_byte(text, end)?;
    Some(&text[from..to])
}

/// Builds `text[..start] + replacement + text[end..]` in char offsets.
///
/// Returns `None` when the range is reversed or runs past the end of `text`.
pub fn splice(text: &str, start: usize, end: usize, replacement: &str) -> Option<String> {
    if start > end {
        return None;
    }
    let from = char_to_byte(text, start)?;
    let to = char_to_byte(text, end)?;
    let mut spliced = String::with_capacity(text.len() - (to - from) + replacement.len());
    spliced.push_str(&text[..from]);
    spliced.push_str(replacement);
    spliced.push_str(&text[to..]);
    Some(spliced)
}
