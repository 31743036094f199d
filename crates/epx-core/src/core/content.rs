// epx-core/src/core/content.rs
// ============================================================================
// Module: EPX Upload Content
// Description: Typed representation of downloaded upload content.
// Purpose: Give the gateways one shape for text, JSON, binary, and archives.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! When the control plane reads an object back (for listing with content or
//! for local download), the upload gateway sniffs the payload and produces an
//! [`UploadContent`]. Archives keep both the raw bytes (for materializing
//! locally) and an entry listing with short previews of text-looking members.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

// ============================================================================
// SECTION: Zip Entries
// ============================================================================

/// One member of a downloaded zip archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipFileEntry {
    /// Member path inside the archive.
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Compressed size in bytes.
    pub compressed_size: u64,
    /// Short preview for text-looking members.
    pub preview: Option<String>,
}

impl ZipFileEntry {
    /// Serializes the entry for API and CLI consumers.
    #[must_use]
    pub fn to_dict(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "size": self.size,
            "compressedSize": self.compressed_size,
            "preview": self.preview,
        })
    }
}

// ============================================================================
// SECTION: Upload Content
// ============================================================================

/// Parsed content of one downloaded upload.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadContent {
    /// Decoded text content.
    Text {
        /// The decoded text.
        content: String,
        /// Encoding the bytes decoded under.
        encoding: String,
    },
    /// JSON text content.
    Json {
        /// The raw JSON text.
        content: String,
    },
    /// Binary content that decoded under no supported encoding.
    Binary {
        /// Hex preview of the first bytes.
        preview: String,
    },
    /// Zip archive content.
    ZipArchive {
        /// Raw archive bytes, kept for local materialization.
        bytes: Vec<u8>,
        /// Entry listing with previews.
        entries: Vec<ZipFileEntry>,
        /// Rendered multi-line summary of the archive.
        summary: String,
    },
}

impl UploadContent {
    /// Creates text content decoded as UTF-8.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
            encoding: "utf-8".to_owned(),
        }
    }

    /// Creates text content decoded under a named fallback encoding.
    #[must_use]
    pub fn text_with_encoding(content: impl Into<String>, encoding: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
            encoding: encoding.into(),
        }
    }

    /// Returns a short label for the content kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Json { .. } => "json",
            Self::Binary { .. } => "binary",
            Self::ZipArchive { .. } => "zip",
        }
    }

    /// Returns the raw bytes to write when materializing this content.
    #[must_use]
    pub fn as_bytes(&self) -> Vec<u8> {
        match self {
            Self::Text { content, .. } | Self::Json { content } => content.clone().into_bytes(),
            Self::Binary { preview } => preview.clone().into_bytes(),
            Self::ZipArchive { bytes, .. } => bytes.clone(),
        }
    }

    /// Serializes the content for API and CLI consumers.
    #[must_use]
    pub fn to_dict(&self) -> Value {
        match self {
            Self::Text { content, encoding } => serde_json::json!({
                "type": "text",
                "encoding": encoding,
                "content": content,
            }),
            Self::Json { content } => serde_json::json!({
                "type": "json",
                "content": content,
            }),
            Self::Binary { preview } => serde_json::json!({
                "type": "binary",
                "content": preview,
            }),
            Self::ZipArchive { entries, summary, .. } => serde_json::json!({
                "type": "zip",
                "content": summary,
                "entries": entries.iter().map(ZipFileEntry::to_dict).collect::<Vec<_>>(),
            }),
        }
    }
}
