//! Image and PDF attachments for the media-driven generation flows.
//!
//! Files are read to completion, checked against the flow they are meant
//! for, and kept as `data:` URIs until a generation consumes them.

use crate::constants::{MAX_MEDIA_SIZE_BYTES, PDF_MIME_TYPE};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Pdf,
}

impl MediaKind {
    pub fn accepts(self, mime_type: &str) -> bool {
        match self {
            MediaKind::Image => mime_type.starts_with("image/"),
            MediaKind::Pdf => mime_type == PDF_MIME_TYPE,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => f.write_str("image"),
            MediaKind::Pdf => f.write_str("PDF"),
        }
    }
}

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Invalid file type ({0}). Please select an image.")]
    NotAnImage(String),
    #[error("Invalid file type ({0}). Please select a PDF file.")]
    NotAPdf(String),
    #[error("Invalid {0} data format.")]
    InvalidData(MediaKind),
    #[error("File is too large ({size} bytes). Maximum allowed size is {max} bytes.")]
    TooLarge { size: usize, max: usize },
    #[error("Failed to read {kind} file: {source}")]
    Io {
        kind: MediaKind,
        #[source]
        source: std::io::Error,
    },
}

/// Base64 payload plus mime type, the shape every provider sends inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineMedia {
    pub mime_type: String,
    pub data: String,
}

impl InlineMedia {
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// A user-supplied image or PDF held as a `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAttachment {
    pub kind: MediaKind,
    pub data_uri: String,
    pub mime_type: String,
    pub file_name: Option<String>,
}

impl MediaAttachment {
    /// Encodes raw file bytes after checking the mime type and size.
    pub fn from_bytes(
        kind: MediaKind,
        bytes: &[u8],
        mime_type: &str,
        file_name: Option<String>,
    ) -> Result<Self, MediaError> {
        check_mime(kind, mime_type)?;
        if bytes.len() > MAX_MEDIA_SIZE_BYTES {
            return Err(MediaError::TooLarge {
                size: bytes.len(),
                max: MAX_MEDIA_SIZE_BYTES,
            });
        }
        Ok(Self {
            kind,
            data_uri: format!("data:{};base64,{}", mime_type, BASE64_STANDARD.encode(bytes)),
            mime_type: mime_type.to_string(),
            file_name,
        })
    }

    /// Wraps a `data:` URI produced elsewhere, such as pasted text.
    ///
    /// The payload is not inspected here; [`MediaAttachment::payload`] does that
    /// right before a generation.
    pub fn from_data_uri(
        kind: MediaKind,
        data_uri: impl Into<String>,
        mime_type: &str,
        file_name: Option<String>,
    ) -> Result<Self, MediaError> {
        check_mime(kind, mime_type)?;
        Ok(Self {
            kind,
            data_uri: data_uri.into(),
            mime_type: mime_type.to_string(),
            file_name,
        })
    }

    /// Reads pasted text as an image, if it is a base64 `data:` URI.
    ///
    /// `None` means the text is not a data URI at all; a data URI of the
    /// wrong type is an error like any other rejected attachment.
    pub fn from_pasted_text(text: &str) -> Option<Result<Self, MediaError>> {
        let header = text.strip_prefix("data:")?.split(',').next()?;
        let mime_type = header.strip_suffix(";base64")?;
        Some(Self::from_data_uri(MediaKind::Image, text, mime_type, None))
    }

    /// Extracts the base64 payload: everything after the first comma.
    pub fn payload(&self) -> Result<InlineMedia, MediaError> {
        match self.data_uri.split_once(',') {
            Some((_, data)) if !data.is_empty() => Ok(InlineMedia {
                mime_type: self.mime_type.clone(),
                data: data.to_string(),
            }),
            _ => Err(MediaError::InvalidData(self.kind)),
        }
    }
}

fn check_mime(kind: MediaKind, mime_type: &str) -> Result<(), MediaError> {
    if kind.accepts(mime_type) {
        return Ok(());
    }
    Err(match kind {
        MediaKind::Image => MediaError::NotAnImage(mime_type.to_string()),
        MediaKind::Pdf => MediaError::NotAPdf(mime_type.to_string()),
    })
}

/// Guesses a mime type from the file extension.
pub fn mime_from_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "pdf" => PDF_MIME_TYPE,
        _ => return None,
    };
    Some(mime)
}

/// Reads a file to completion and turns it into an attachment for `kind`.
pub async fn read_attachment(path: &Path, kind: MediaKind) -> Result<MediaAttachment, MediaError> {
    let mime_type = mime_from_path(path).unwrap_or("application/octet-stream");
    check_mime(kind, mime_type)?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| MediaError::Io { kind, source })?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());

    tracing::info!(
        "Loaded {} attachment {:?} ({} bytes)",
        kind,
        file_name.as_deref().unwrap_or("<unnamed>"),
        bytes.len()
    );
    MediaAttachment::from_bytes(kind, &bytes, mime_type, file_name)
}
