//! Image attachment encoding
//!
//! Turns raw image bytes into a `data:` URI suitable for transport, and
//! splits such a URI back into mime type and base64 payload for the
//! generation request.

use crate::{ChatterError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Largest attachment accepted for inline transport (20 MiB)
pub const MAX_ATTACHMENT_BYTES: usize = 20 * 1024 * 1024;

/// Mime type assumed when a payload arrives without a transport prefix
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// A `data:<mime>;base64,<payload>` string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataUri(String);

impl DataUri {
    pub fn from_base64(mime_type: &str, payload: &str) -> Self {
        Self(format!("data:{};base64,{}", mime_type, payload))
    }

    /// Wrap an existing string without validation
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn mime_type(&self) -> String {
        strip_transport_prefix(&self.0).mime_type
    }
}

/// Mime type and base64 payload, as sent in a request's inline data part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Encode raw image bytes into a data URI.
pub fn encode(bytes: &[u8]) -> Result<DataUri> {
    if bytes.is_empty() {
        return Err(ChatterError::AttachmentReadError(
            "attachment is empty".into(),
        ));
    }

    if bytes.len() > MAX_ATTACHMENT_BYTES {
        return Err(ChatterError::AttachmentReadError(format!(
            "attachment is {} bytes, limit is {}",
            bytes.len(),
            MAX_ATTACHMENT_BYTES
        )));
    }

    let mime_type = sniff_image_mime(bytes).ok_or_else(|| {
        ChatterError::AttachmentReadError("attachment is not a supported image".into())
    })?;

    debug!("Encoded {} byte {} attachment", bytes.len(), mime_type);
    Ok(DataUri::from_base64(mime_type, &STANDARD.encode(bytes)))
}

/// Read a file and encode it. The file handle is dropped before encoding,
/// on success and on every error path.
pub async fn encode_file(path: impl AsRef<Path>) -> Result<DataUri> {
    let path = path.as_ref();

    let bytes = {
        let mut file = tokio::fs::File::open(path).await.map_err(|e| {
            warn!("Failed to open attachment {:?}: {}", path, e);
            ChatterError::AttachmentReadError(format!("{}: {}", path.display(), e))
        })?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).await.map_err(|e| {
            warn!("Failed to read attachment {:?}: {}", path, e);
            ChatterError::AttachmentReadError(format!("{}: {}", path.display(), e))
        })?;
        bytes
    };

    encode(&bytes)
}

/// Split a data URI into mime type and payload.
///
/// A bare payload (no `data:` prefix) is passed through with the default
/// image mime type.
pub fn strip_transport_prefix(data_uri: &str) -> InlineData {
    if let Some(rest) = data_uri.strip_prefix("data:") {
        if let Some((header, payload)) = rest.split_once(',') {
            let mime_type = header
                .split(';')
                .next()
                .filter(|m| !m.is_empty())
                .unwrap_or(DEFAULT_IMAGE_MIME);
            return InlineData {
                mime_type: mime_type.to_string(),
                data: payload.to_string(),
            };
        }
    }

    InlineData {
        mime_type: DEFAULT_IMAGE_MIME.to_string(),
        data: data_uri.to_string(),
    }
}

/// Recover the raw bytes of a data URI.
pub fn decode(data_uri: &DataUri) -> Result<Vec<u8>> {
    let inline = strip_transport_prefix(data_uri.as_str());
    STANDARD
        .decode(inline.data.as_bytes())
        .map_err(|e| ChatterError::AttachmentReadError(format!("invalid base64 payload: {}", e)))
}

fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}
