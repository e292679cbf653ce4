//! The named text codec the script module is parameterized over.
//!
//! The original engine's scripts are Shift-JIS (Windows code page 932) by
//! default; `--encoding` on the CLI lets a caller pick another registered
//! `encoding_rs` codec by name or numeric code page.

use crate::error::{CoreError, Result};
use encoding_rs::Encoding;

#[derive(Debug, Clone, Copy)]
pub struct TextCodec(&'static Encoding);

impl TextCodec {
    pub fn shift_jis() -> Self {
        TextCodec(encoding_rs::SHIFT_JIS)
    }

    pub fn utf8() -> Self {
        TextCodec(encoding_rs::UTF_8)
    }

    /// Resolves a codec by name (`"shift-jis"`, `"sjis"`, `"utf-8"`, ...) or
    /// by Windows code page number (`"932"`).
    pub fn by_name(name: &str) -> Result<Self> {
        let normalized = name.trim().to_ascii_lowercase();
        let encoding = match normalized.as_str() {
            "shift-jis" | "shiftjis" | "sjis" | "932" => Some(encoding_rs::SHIFT_JIS),
            "utf-8" | "utf8" | "65001" => Some(encoding_rs::UTF_8),
            other => Encoding::for_label(other.as_bytes()),
        };
        encoding
            .map(TextCodec)
            .ok_or_else(|| CoreError::UnsupportedFormat(format!("unknown text codec {name:?}")))
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        let (text, _, _) = self.0.decode(bytes);
        text.into_owned()
    }

    /// Encodes `text` in this codec, failing with [`CoreError::EncodingFailure`]
    /// if any character cannot be represented (a lossy replacement would
    /// silently corrupt the patched script).
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        let (bytes, _, had_errors) = self.0.encode(text);
        if had_errors {
            return Err(CoreError::EncodingFailure(text.to_string()));
        }
        Ok(bytes.into_owned())
    }
}

impl Default for TextCodec {
    fn default() -> Self {
        TextCodec::shift_jis()
    }
}
