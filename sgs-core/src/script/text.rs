//! Display-text escape handling and the `◇`/`◆` translation file format.

use crate::encoding::TextCodec;
use crate::error::{CoreError, Result};

/// The two-byte sequence marking a rendered line break.
const LINE_BREAK_PAIR: [u8; 2] = [0x81, 0x8F];
/// The two-byte sequence marking a deferred token expansion, followed by a
/// one-byte token id.
const DEFERRED_TOKEN_PAIR: [u8; 2] = [0x81, 0x90];

/// Decodes raw display-text bytes (no NUL terminator) into a `String`.
///
/// Ordinary bytes and the `0x814F`/`0x818F` two-byte sequences are decoded
/// in bulk through `codec` — `0x818F` decodes to the real full-width yen
/// character under Shift-JIS, which is exactly the line-break marker the
/// format notes describe. `0x8190` is special-cased: its expansion is
/// deferred by the source, so it is kept unexpanded here as a
/// `<token N>` placeholder rather than decoded as text.
pub fn decode_display_text(raw: &[u8], codec: TextCodec) -> String {
    let mut result = String::new();
    let mut pending: Vec<u8> = Vec::new();
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        if b >= 0x80 && i + 1 < raw.len() {
            if raw[i] == DEFERRED_TOKEN_PAIR[0] && raw[i + 1] == DEFERRED_TOKEN_PAIR[1] && i + 2 < raw.len() {
                if !pending.is_empty() {
                    result.push_str(&codec.decode(&pending));
                    pending.clear();
                }
                result.push_str(&format!("<token {}>", raw[i + 2]));
                i += 3;
                continue;
            }
            pending.push(raw[i]);
            pending.push(raw[i + 1]);
            i += 2;
            continue;
        }
        pending.push(b);
        i += 1;
    }
    if !pending.is_empty() {
        result.push_str(&codec.decode(&pending));
    }
    result
}

/// Inverse of [`decode_display_text`]: re-encodes `<token N>` placeholders
/// back to their raw `0x8190 N` bytes and everything else through `codec`.
pub fn encode_display_text(text: &str, codec: TextCodec) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("<token ") {
        let (before, after_marker) = rest.split_at(start);
        if !before.is_empty() {
            out.extend_from_slice(&codec.encode(before)?);
        }
        let after = &after_marker["<token ".len()..];
        let end = after
            .find('>')
            .ok_or_else(|| CoreError::EncodingFailure(text.to_string()))?;
        let id: u8 = after[..end]
            .parse()
            .map_err(|_| CoreError::EncodingFailure(text.to_string()))?;
        out.push(DEFERRED_TOKEN_PAIR[0]);
        out.push(DEFERRED_TOKEN_PAIR[1]);
        out.push(id);
        rest = &after[end + 1..];
    }
    if !rest.is_empty() {
        out.extend_from_slice(&codec.encode(rest)?);
    }
    Ok(out)
}

/// Replaces the line-break marker with a literal `\n` and doubles literal
/// backslashes, for writing into a translation file.
pub fn escape_for_export(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\u{FFE5}', "\\n")
}

/// Inverse of [`escape_for_export`], applied while parsing a translation
/// file back in. A single left-to-right scan avoids re-interpreting the
/// output of one substitution as input to the other.
pub fn unescape_from_import(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            match chars[i + 1] {
                'n' => {
                    out.push('\u{FFE5}');
                    i += 2;
                    continue;
                }
                '\\' => {
                    out.push('\\');
                    i += 2;
                    continue;
                }
                _ => {}
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// One parsed translation-file entry: the address the `◆` line refers to,
/// its optional `|name|` prefix, and its unescaped text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub address: u32,
    pub name: Option<String>,
    pub text: String,
}

/// Parses a translation file, keeping only `◆` lines.
pub fn parse_translations(contents: &str) -> Vec<Translation> {
    let mut out = Vec::new();
    for line in contents.lines() {
        if !line.contains('◆') {
            continue;
        }
        let mut parts = line.splitn(3, '◆');
        let _lead = parts.next();
        let addr_part = match parts.next() {
            Some(p) => p,
            None => continue,
        };
        let rest = match parts.next() {
            Some(p) => p,
            None => continue,
        };
        let address = match u32::from_str_radix(addr_part.trim(), 16) {
            Ok(a) => a,
            Err(_) => continue,
        };
        let rest = rest.strip_prefix('|').unwrap_or(rest);
        let (name, text) = if let Some(idx) = rest.find('|') {
            (Some(rest[..idx].to_string()), rest[idx + 1..].to_string())
        } else {
            (None, rest.to_string())
        };
        out.push(Translation {
            address,
            name,
            text: unescape_from_import(&text),
        });
    }
    out
}

/// Splits `text` on existing `\n` breaks and, for any segment longer than
/// `max_line_length` characters, breaks at the last space before the limit
/// (or at the limit if no space is found), recombining with the internal
/// line-break character.
pub fn auto_line_break(text: &str, max_line_length: usize) -> String {
    let segments: Vec<String> = text
        .split('\u{FFE5}')
        .map(|segment| wrap_segment(segment, max_line_length))
        .collect();
    segments.join("\u{FFE5}")
}

fn wrap_segment(segment: &str, max_line_length: usize) -> String {
    let chars: Vec<char> = segment.chars().collect();
    if chars.len() <= max_line_length || max_line_length == 0 {
        return segment.to_string();
    }
    let mut lines = Vec::new();
    let mut rest = chars.as_slice();
    while rest.len() > max_line_length {
        let window = &rest[..max_line_length];
        let break_at = window.iter().rposition(|&c| c == ' ').unwrap_or(max_line_length);
        let break_at = if break_at == 0 { max_line_length } else { break_at };
        lines.push(rest[..break_at].iter().collect::<String>());
        rest = &rest[break_at..];
    }
    if !rest.is_empty() {
        lines.push(rest.iter().collect::<String>());
    }
    lines.join("\u{FFE5}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_break_pair_decodes_to_yen_and_round_trips() {
        let raw = LINE_BREAK_PAIR.to_vec();
        let codec = TextCodec::shift_jis();
        let text = decode_display_text(&raw, codec);
        assert_eq!(text, "\u{FFE5}");
        let back = encode_display_text(&text, codec).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn deferred_token_is_kept_as_placeholder() {
        let raw = vec![0x81, 0x90, 0x07, b'x'];
        let codec = TextCodec::shift_jis();
        let text = decode_display_text(&raw, codec);
        assert_eq!(text, "<token 7>x");
        let back = encode_display_text(&text, codec).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn escape_and_unescape_round_trip() {
        let original = "line one\u{FFE5}line \\two";
        let escaped = escape_for_export(original);
        assert_eq!(escaped, "line one\\nline \\\\two");
        assert_eq!(unescape_from_import(&escaped), original);
    }

    #[test]
    fn auto_line_break_splits_at_last_space() {
        let wrapped = auto_line_break("hello there friend", 10);
        assert_eq!(wrapped, "hello\u{FFE5}there\u{FFE5}friend");
    }

    #[test]
    fn parse_translations_extracts_address_and_name() {
        let file = "◇00000003◇|5|Hi\n◆00000003◆|5|Hello\n\n";
        let translations = parse_translations(file);
        assert_eq!(translations.len(), 1);
        assert_eq!(translations[0].address, 3);
        assert_eq!(translations[0].name.as_deref(), Some("5"));
        assert_eq!(translations[0].text, "Hello");
    }
}
