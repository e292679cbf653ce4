//! The script bytecode disassembler, text exporter, and patching importer.

pub mod opcodes;
mod text;

pub use text::{auto_line_break, escape_for_export, parse_translations, Translation};

/// Renders every recorded string in `source` as the `◇`/`◆` translation
/// document: original line, editable translation line (seeded with the
/// original text), then a blank line.
///
/// A recorded `name_token` is the speaker label, resolved against the token
/// table built during the same walk rather than printed as a bare number —
/// an unresolved id (the token was never defined) falls back to the numeric
/// id so no information is silently dropped.
pub fn export(source: &[u8], codec: TextCodec) -> Result<String> {
    let disasm = disassemble(source, codec)?;
    let mut out = String::new();
    for record in &disasm.strings {
        let escaped = text::escape_for_export(&record.text);
        let name = record
            .name_token
            .map(|id| {
                let resolved = disasm.token_table.lookup(id).map(str::to_string);
                format!("|{}|", resolved.unwrap_or_else(|| (id as u32 + 1).to_string()))
            })
            .unwrap_or_default();
        out.push_str(&format!("\u{25C7}{:08X}\u{25C7}{name}{escaped}\n", record.address));
        out.push_str(&format!("\u{25C6}{:08X}\u{25C6}{name}{escaped}\n", record.address));
        out.push('\n');
    }
    Ok(out)
}

use crate::encoding::TextCodec;
use crate::error::{CoreError, Result};
use crate::reader::Cursor;
use log::warn;
use opcodes::{Field, JumpKind, Operand};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpReference {
    pub operand_address: u32,
    pub target_address: u32,
    pub kind: JumpKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringKind {
    Display,
    Token,
    Choice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringRecord {
    pub address: u32,
    pub kind: StringKind,
    pub name_token: Option<u8>,
    pub text: String,
}

/// Tokens registered by `SET_TEXT_TOKEN` during one script walk. The stored
/// id is `id + 1`, matching the source's off-by-one (preserved, not fixed —
/// see the design notes).
#[derive(Debug, Default, Clone)]
pub struct TokenTable {
    entries: Vec<(u32, String)>,
}

impl TokenTable {
    fn insert(&mut self, raw_id: u8, text: String) {
        self.entries.push((raw_id as u32 + 1, text));
    }

    pub fn entries(&self) -> &[(u32, String)] {
        &self.entries
    }

    /// Resolves `raw_id` (the id byte as read from the opcode, before the
    /// `+1` storage offset) to its registered text, if any.
    fn lookup(&self, raw_id: u8) -> Option<&str> {
        let stored_id = raw_id as u32 + 1;
        self.entries
            .iter()
            .find(|(id, _)| *id == stored_id)
            .map(|(_, text)| text.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct DisasmResult {
    pub lines: Vec<String>,
    pub jump_references: Vec<JumpReference>,
    pub strings: Vec<StringRecord>,
    pub token_table: TokenTable,
}

struct Walker<'a> {
    cursor: Cursor<'a>,
    codec: TextCodec,
}

impl<'a> Walker<'a> {
    fn pos(&self) -> usize {
        self.cursor.pos()
    }

    fn peek_is(&self, byte: u8) -> bool {
        self.cursor.peek_u8().map(|b| b == byte).unwrap_or(false)
    }

    fn read_u8(&mut self) -> Result<u8> {
        self.cursor.read_u8()
    }

    fn read_u16(&mut self) -> Result<u16> {
        self.cursor.read_u16_le()
    }

    fn read_s16(&mut self) -> Result<i16> {
        self.cursor.read_i16_le()
    }

    fn read_u32(&mut self) -> Result<u32> {
        self.cursor.read_u32_le()
    }

    fn read_cstr_bytes(&mut self) -> Result<Vec<u8>> {
        self.cursor.read_cstr()
    }

    fn read_field(&mut self, field: Field) -> Result<u32> {
        Ok(match field {
            Field::U8 => self.read_u8()? as u32,
            Field::U16 => self.read_u16()? as u32,
            Field::U32 => self.read_u32()?,
        })
    }
}

/// Walks `data` from offset 0, producing one disassembly line per
/// instruction plus the jump/string/token side tables. The walk is strictly
/// linear and never follows a jump; an unrecognized opcode or a read past
/// the end of the buffer halts the walk at that line.
pub fn disassemble(data: &[u8], codec: TextCodec) -> Result<DisasmResult> {
    let mut walker = Walker { cursor: Cursor::new(data), codec };
    let mut lines = Vec::new();
    let mut jump_references = Vec::new();
    let mut strings = Vec::new();
    let mut tokens = TokenTable::default();

    while !walker.cursor.eof() {
        let start = walker.pos();
        let opcode = walker.read_u8()?;

        let def = match opcodes::lookup(opcode) {
            Some(d) => d,
            None => {
                warn!("unrecognized opcode 0x{opcode:02X} at {start:08X}, stopping walk");
                lines.push(format!("{start:08X} | UNKNOWN_OPCODE 0x{opcode:02X}"));
                break;
            }
        };

        match step(&mut walker, def.mnemonic, def.operand, start as u32, &mut tokens) {
            Ok((operand_text, jump, string)) => {
                lines.push(format!("{start:08X} | {} {}", def.mnemonic, operand_text));
                if let Some(j) = jump {
                    jump_references.push(j);
                }
                if let Some(s) = string {
                    strings.push(s);
                }
            }
            Err(e) => {
                lines.push(format!("{start:08X} | {} <error: {e}>", def.mnemonic));
                break;
            }
        }
    }

    Ok(DisasmResult {
        lines,
        jump_references,
        strings,
        token_table: tokens,
    })
}

fn step(
    walker: &mut Walker,
    _mnemonic: &str,
    operand: Operand,
    start: u32,
    tokens: &mut TokenTable,
) -> Result<(String, Option<JumpReference>, Option<StringRecord>)> {
    match operand {
        Operand::None => Ok((String::new(), None, None)),
        Operand::U8 => {
            let v = walker.read_u8()?;
            Ok((format!("0x{v:02X}"), None, None))
        }
        Operand::U16 => {
            let v = walker.read_u16()?;
            Ok((format!("0x{v:04X}"), None, None))
        }
        Operand::S16 => {
            let v = walker.read_s16()?;
            Ok((format!("{v}"), None, None))
        }
        Operand::U32 => {
            let v = walker.read_u32()?;
            Ok((format!("0x{v:08X}"), None, None))
        }
        Operand::PairList => {
            let mut packed = Vec::new();
            loop {
                let a = walker.read_u8()?;
                if a == 0 {
                    break;
                }
                let b = walker.read_u16()?;
                packed.push(((a as u32) << 16) | b as u32);
            }
            let text = packed
                .iter()
                .map(|p| format!("0x{p:06X}"))
                .collect::<Vec<_>>()
                .join(",");
            Ok((format!("[{text}]"), None, None))
        }
        Operand::DwordArray => {
            let count = walker.read_u8()?;
            let mut values = Vec::with_capacity(count as usize);
            for _ in 0..count {
                values.push(walker.read_u32()?);
            }
            let text = values
                .iter()
                .map(|v| format!("0x{v:08X}"))
                .collect::<Vec<_>>()
                .join(",");
            Ok((format!("[{text}]"), None, None))
        }
        Operand::DisplayText => {
            let name_token = if walker.peek_is(0x01) {
                walker.read_u8()?;
                Some(walker.read_u8()?)
            } else {
                None
            };
            let address = walker.pos() as u32;
            let raw = walker.read_cstr_bytes()?;
            let text = text::decode_display_text(&raw, walker.codec);
            let record = StringRecord {
                address,
                kind: StringKind::Display,
                name_token,
                text: text.clone(),
            };
            Ok((format!("{start:08X}+{address:08X} {text:?}"), None, Some(record)))
        }
        Operand::TokenText => {
            let raw_id = walker.read_u8()?;
            let address = walker.pos() as u32;
            let raw = walker.read_cstr_bytes()?;
            let text = walker.codec.decode(&raw);
            tokens.insert(raw_id, text.clone());
            let record = StringRecord {
                address,
                kind: StringKind::Token,
                name_token: Some(raw_id),
                text: text.clone(),
            };
            Ok((format!("id={} {text:?}", raw_id as u32 + 1), None, Some(record)))
        }
        Operand::ChoiceText3e => {
            let name_token = if walker.peek_is(0x01) {
                walker.read_u8()?;
                Some(walker.read_u8()?)
            } else {
                None
            };
            let address = walker.pos() as u32;
            let raw = walker.read_cstr_bytes()?;
            let text = walker.codec.decode(&raw);
            let record = StringRecord {
                address,
                kind: StringKind::Choice,
                name_token,
                text: text.clone(),
            };
            Ok((format!("{text:?}"), None, Some(record)))
        }
        Operand::ChoiceText69 => {
            let _target_addr = walker.read_u16()?;
            let address = walker.pos() as u32;
            let raw = walker.read_cstr_bytes()?;
            let text = walker.codec.decode(&raw);
            let record = StringRecord {
                address,
                kind: StringKind::Choice,
                name_token: None,
                text: text.clone(),
            };
            Ok((format!("{text:?}"), None, Some(record)))
        }
        Operand::Jump(kind, extra) => {
            let mut extra_values = Vec::with_capacity(extra.len());
            for field in extra {
                extra_values.push(walker.read_field(*field)?);
            }
            let operand_address = walker.pos() as u32;
            let target_address = walker.read_u16()? as u32;
            let jump = JumpReference {
                operand_address,
                target_address,
                kind,
            };
            let extra_text = extra_values
                .iter()
                .map(|v| format!("0x{v:X}"))
                .collect::<Vec<_>>()
                .join(",");
            let text = if extra_text.is_empty() {
                format!("0x{target_address:04X}")
            } else {
                format!("{extra_text} -> 0x{target_address:04X}")
            };
            Ok((text, Some(jump), None))
        }
    }
}

/// Rewrites `source` by substituting `translations` (keyed by recorded
/// string address) while keeping every jump target consistent.
///
/// Unchanged addresses (translation text equal to the original) are left
/// untouched. For each changed address, `delta` is the signed byte-length
/// difference of the new NUL-terminated string versus the original; jump
/// operands are patched by adding the sum of deltas of every changed
/// address strictly less than their current target (the ordering guarantee
/// that string addresses increase monotonically during disassembly is what
/// makes this prefix sum correct).
pub fn import(
    source: &[u8],
    translations: &[Translation],
    codec: TextCodec,
    max_line_length: usize,
) -> Result<Vec<u8>> {
    let disasm = disassemble(source, codec)?;

    let by_address: BTreeMap<u32, &StringRecord> =
        disasm.strings.iter().map(|s| (s.address, s)).collect();

    let mut changes: BTreeMap<u32, (Vec<u8>, i64)> = BTreeMap::new();
    for translation in translations {
        let original = match by_address.get(&translation.address) {
            Some(s) => s,
            None => {
                warn!("translation at {:08X} has no matching string, skipping", translation.address);
                continue;
            }
        };
        if translation.text == original.text {
            continue;
        }
        let wrapped = auto_line_break(&translation.text, max_line_length);
        let new_bytes = text::encode_display_text(&wrapped, codec)?;
        let original_bytes = text::encode_display_text(&original.text, codec)?;
        let delta = (new_bytes.len() as i64 + 1) - (original_bytes.len() as i64 + 1);
        changes.insert(translation.address, (new_bytes, delta));
    }

    if changes.is_empty() {
        return Ok(source.to_vec());
    }

    let mut patched = source.to_vec();
    for jump in &disasm.jump_references {
        let cumulative: i64 = changes
            .iter()
            .filter(|(addr, _)| **addr < jump.target_address)
            .map(|(_, (_, delta))| *delta)
            .sum();
        if cumulative == 0 {
            continue;
        }
        let adjusted = jump.target_address as i64 + cumulative;
        if adjusted < 0 || adjusted > u16::MAX as i64 {
            return Err(CoreError::OverflowTarget(adjusted as u32));
        }
        let at = jump.operand_address as usize;
        patched[at..at + 2].copy_from_slice(&(adjusted as u16).to_le_bytes());
    }

    let original_lengths: BTreeMap<u32, usize> = by_address
        .iter()
        .filter(|(addr, _)| changes.contains_key(addr))
        .map(|(addr, record)| {
            let len = text::encode_display_text(&record.text, codec)
                .map(|b| b.len() + 1)
                .unwrap_or(record.text.len() + 1);
            (*addr, len)
        })
        .collect();

    let total_delta: i64 = changes.values().map(|(_, d)| *d).sum();
    let new_len = (patched.len() as i64 + total_delta).max(0) as usize;
    let mut out = Vec::with_capacity(new_len);

    let mut cursor = 0usize;
    for (&address, (new_bytes, _)) in &changes {
        let address = address as usize;
        out.extend_from_slice(&patched[cursor..address]);
        out.extend_from_slice(new_bytes);
        out.push(0);
        let original_len = original_lengths[&(address as u32)];
        cursor = address + original_len;
    }
    out.extend_from_slice(&patched[cursor..]);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::TextCodec;

    #[test]
    fn scenario_jump_and_display_text() {
        let mut script = vec![0x14, 0x10, 0x00];
        script.resize(0x10, 0);
        script.extend_from_slice(&[0x21, 0x01, 0x05, b'H', b'i', 0x00]);

        let result = disassemble(&script, TextCodec::shift_jis()).unwrap();
        assert_eq!(result.jump_references.len(), 1);
        assert_eq!(result.jump_references[0].operand_address, 1);
        assert_eq!(result.jump_references[0].target_address, 0x10);

        assert_eq!(result.strings.len(), 1);
        assert_eq!(result.strings[0].address, 0x10 + 3);
        assert_eq!(result.strings[0].text, "Hi");
        assert_eq!(result.strings[0].name_token, Some(5));
    }

    #[test]
    fn export_resolves_name_prefix_from_token_table() {
        let mut script = vec![0x24, 0x04];
        script.extend_from_slice(b"Alice\0");
        script.extend_from_slice(&[0x21, 0x01, 0x04]);
        script.extend_from_slice(b"Hi\0");

        let text = export(&script, TextCodec::shift_jis()).unwrap();
        assert!(text.contains("|Alice|Hi"));
    }

    #[test]
    fn string_addresses_strictly_increase() {
        let mut script = vec![0x21, b'a', 0x00];
        script.extend_from_slice(&[0x21, b'b', 0x00]);
        let result = disassemble(&script, TextCodec::shift_jis()).unwrap();
        assert_eq!(result.strings.len(), 2);
        assert!(result.strings[0].address < result.strings[1].address);
    }

    #[test]
    fn import_without_size_change_leaves_jumps_untouched() {
        let mut script = vec![0x14, 0x10, 0x00];
        script.resize(0x10, 0);
        script.extend_from_slice(&[0x21, b'H', b'i', 0x00]);

        let translations = vec![Translation {
            address: 0x10 + 1,
            name: None,
            text: "Ho".to_string(),
        }];
        let out = import(&script, &translations, TextCodec::shift_jis(), 50).unwrap();
        assert_eq!(out.len(), script.len());
        assert_eq!(&out[1..3], &0x10u16.to_le_bytes());
    }

    #[test]
    fn import_growth_shifts_later_jump_target() {
        // Opcode 0x14 (JUMP_TO, target 150) at 0, then DISPLAY_TEXT opcodes
        // (0x21) placed so their text starts at byte 100 and byte 200; every
        // other byte is 0x00 (NOP), which the walker steps over one byte at
        // a time with no operand.
        let mut script = vec![0u8; 210];
        script[0] = 0x14;
        script[1..3].copy_from_slice(&150u16.to_le_bytes());
        script[99] = 0x21;
        script[100] = b'a';
        script[101] = 0;
        script[199] = 0x21;
        script[200] = b'b';
        script[201] = 0;

        let translations = vec![Translation {
            address: 100,
            name: None,
            text: "aaaaa".to_string(), // +4 bytes
        }];
        let out = import(&script, &translations, TextCodec::shift_jis(), 50).unwrap();
        let new_target = u16::from_le_bytes(out[1..3].try_into().unwrap());
        assert_eq!(new_target, 154);

        let translations_only_late = vec![Translation {
            address: 200,
            name: None,
            text: "bbbbb".to_string(),
        }];
        let out2 = import(&script, &translations_only_late, TextCodec::shift_jis(), 50).unwrap();
        let target2 = u16::from_le_bytes(out2[1..3].try_into().unwrap());
        assert_eq!(target2, 150);
    }

    #[test]
    fn import_leaves_long_untouched_translation_unpatched() {
        // A translation equal to the original, longer than max_line_length
        // and with no embedded break at the wrap point: wrapping it first
        // would falsely look "changed" against the original.
        let text = "a".repeat(20);
        let mut script = vec![0x21];
        script.extend_from_slice(text.as_bytes());
        script.push(0x00);

        let translations = vec![Translation {
            address: 1,
            name: None,
            text: text.clone(),
        }];
        let out = import(&script, &translations, TextCodec::shift_jis(), 10).unwrap();
        assert_eq!(out, script);
    }
}
