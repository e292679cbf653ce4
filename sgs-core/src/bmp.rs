//! Minimal 8-bit indexed BMP reader/writer used to export and re-import
//! animation frames.
//!
//! Hand-rolled rather than built on an imaging crate: the format this needs
//! is narrow (8bpp indexed, bottom-up, a specific 4-byte BGRA palette
//! stride) and easier to get byte-exact by writing the header fields
//! directly than by working around a general-purpose encoder's own
//! conventions.

use crate::error::{CoreError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Write};

const FILE_HEADER_LEN: u32 = 14;
const INFO_HEADER_LEN: u32 = 40;
const PALETTE_ENTRY_LEN: u32 = 4;
const PALETTE_LEN: u32 = 256 * PALETTE_ENTRY_LEN;

/// Rounds a row's byte length up to the next multiple of 4, BMP's mandatory
/// row alignment.
fn row_stride(width: usize) -> usize {
    (width + 3) & !3
}

/// Encodes `indices` (row-major, top-down, `width * height` palette
/// indices) as an 8-bit indexed BMP with a 256-entry BGRA palette.
pub fn encode_indexed_bmp(width: u16, height: u16, indices: &[u8], palette: &[crate::anm::Rgb]) -> Result<Vec<u8>> {
    let width = width as usize;
    let height = height as usize;
    if indices.len() != width * height {
        return Err(CoreError::UnsupportedFormat(format!(
            "bitmap data length {} does not match {width}x{height}",
            indices.len()
        )));
    }
    let stride = row_stride(width);
    let pixel_data_len = stride * height;
    let pixel_offset = FILE_HEADER_LEN + INFO_HEADER_LEN + PALETTE_LEN;
    let file_len = pixel_offset + pixel_data_len as u32;

    let mut out = Vec::with_capacity(file_len as usize);
    out.write_u8(b'B')?;
    out.write_u8(b'M')?;
    out.write_u32::<LittleEndian>(file_len)?;
    out.write_u32::<LittleEndian>(0)?;
    out.write_u32::<LittleEndian>(pixel_offset)?;

    out.write_u32::<LittleEndian>(INFO_HEADER_LEN)?;
    out.write_i32::<LittleEndian>(width as i32)?;
    out.write_i32::<LittleEndian>(height as i32)?;
    out.write_u16::<LittleEndian>(1)?;
    out.write_u16::<LittleEndian>(8)?;
    out.write_u32::<LittleEndian>(0)?;
    out.write_u32::<LittleEndian>(pixel_data_len as u32)?;
    out.write_i32::<LittleEndian>(2835)?;
    out.write_i32::<LittleEndian>(2835)?;
    out.write_u32::<LittleEndian>(256)?;
    out.write_u32::<LittleEndian>(0)?;

    for i in 0..256usize {
        let color = palette.get(i).copied().unwrap_or(crate::anm::Rgb { r: 0, g: 0, b: 0 });
        out.write_u8(color.b)?;
        out.write_u8(color.g)?;
        out.write_u8(color.r)?;
        out.write_u8(0)?;
    }

    let mut row_buf = vec![0u8; stride];
    for row in (0..height).rev() {
        let src = &indices[row * width..row * width + width];
        row_buf[..width].copy_from_slice(src);
        for pad in row_buf.iter_mut().skip(width) {
            *pad = 0;
        }
        out.write_all(&row_buf)?;
    }

    Ok(out)
}

/// Decodes an 8-bit indexed BMP back into `(width, height, indices,
/// palette)`. Only the uncompressed 8bpp layout this codec writes is
/// accepted; anything else is `UnsupportedFormat`.
pub fn decode_indexed_bmp(bytes: &[u8]) -> Result<(u16, u16, Vec<u8>, Vec<crate::anm::Rgb>)> {
    let mut cursor = Cursor::new(bytes);
    let b0 = cursor.read_u8()?;
    let b1 = cursor.read_u8()?;
    if b0 != b'B' || b1 != b'M' {
        return Err(CoreError::BadMagic {
            expected: b"BM".to_vec(),
            got: vec![b0, b1],
        });
    }
    cursor.set_position(10);
    let pixel_offset = cursor.read_u32::<LittleEndian>()?;

    let header_len = cursor.read_u32::<LittleEndian>()?;
    if header_len != INFO_HEADER_LEN {
        return Err(CoreError::UnsupportedFormat(format!(
            "unsupported BMP info header size {header_len}"
        )));
    }
    let width = cursor.read_i32::<LittleEndian>()?;
    let height_signed = cursor.read_i32::<LittleEndian>()?;
    let planes = cursor.read_u16::<LittleEndian>()?;
    let bits_per_pixel = cursor.read_u16::<LittleEndian>()?;
    let compression = cursor.read_u32::<LittleEndian>()?;
    if planes != 1 || bits_per_pixel != 8 || compression != 0 {
        return Err(CoreError::UnsupportedFormat(format!(
            "only uncompressed 8bpp BMP is supported (got {bits_per_pixel}bpp, compression {compression})"
        )));
    }
    if width <= 0 || width > u16::MAX as i32 {
        return Err(CoreError::UnsupportedFormat(format!("invalid BMP width {width}")));
    }
    let width = width as usize;
    let bottom_up = height_signed >= 0;
    let height = height_signed.unsigned_abs() as usize;
    if height > u16::MAX as usize {
        return Err(CoreError::UnsupportedFormat(format!("invalid BMP height {height_signed}")));
    }

    let palette_offset = FILE_HEADER_LEN + header_len;
    let mut palette = Vec::with_capacity(256);
    for i in 0..256usize {
        let at = palette_offset as usize + i * 4;
        if at + 3 >= bytes.len() {
            break;
        }
        palette.push(crate::anm::Rgb {
            b: bytes[at],
            g: bytes[at + 1],
            r: bytes[at + 2],
        });
    }

    let stride = row_stride(width);
    let mut indices = vec![0u8; width * height];
    for row in 0..height {
        let file_row = if bottom_up { height - 1 - row } else { row };
        let at = pixel_offset as usize + file_row * stride;
        if at + width > bytes.len() {
            return Err(CoreError::Truncated {
                expected: at + width,
                got: bytes.len(),
            });
        }
        indices[row * width..row * width + width].copy_from_slice(&bytes[at..at + width]);
    }

    Ok((width as u16, height as u16, indices, palette))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anm::Rgb;

    fn ramp_palette() -> Vec<Rgb> {
        (0..256).map(|i| Rgb { r: i as u8, g: i as u8, b: i as u8 }).collect()
    }

    #[test]
    fn round_trips_non_multiple_of_four_width() {
        let indices: Vec<u8> = (0..15).collect();
        let palette = ramp_palette();
        let bytes = encode_indexed_bmp(5, 3, &indices, &palette).unwrap();
        let (w, h, decoded, decoded_palette) = decode_indexed_bmp(&bytes).unwrap();
        assert_eq!((w, h), (5, 3));
        assert_eq!(decoded, indices);
        assert_eq!(decoded_palette[7], palette[7]);
    }

    #[test]
    fn rejects_bad_magic() {
        let err = decode_indexed_bmp(&[0u8; 64]).unwrap_err();
        assert!(matches!(err, CoreError::BadMagic { .. }));
    }
}
