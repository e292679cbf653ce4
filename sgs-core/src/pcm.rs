//! The sound engine's PCM/WAV codec: format detection, resampling, channel
//! mixing, and bit-depth/signedness conversion.

use crate::error::{CoreError, Result};
use std::fmt;

/// Gates which raw-PCM default format applies. Ordered exactly
/// `Unrestricted < PreGtb < Gtb < PostGtb`; only the relative position
/// against `Gtb` matters anywhere in this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VersionGate {
    Unrestricted,
    PreGtb,
    Gtb,
    PostGtb,
}

impl VersionGate {
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "unrestricted" => Ok(VersionGate::Unrestricted),
            "pregtb" => Ok(VersionGate::PreGtb),
            "gtb" => Ok(VersionGate::Gtb),
            "postgtb" => Ok(VersionGate::PostGtb),
            other => Err(CoreError::UnsupportedFormat(format!(
                "unknown version gate {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Raw,
    Wave,
    WaveBe,
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Container::Raw => "raw",
            Container::Wave => "wave",
            Container::WaveBe => "wave-be",
        };
        f.write_str(s)
    }
}

/// A decoded sound, normalized to an internal little-endian sample
/// representation regardless of the container it was read from.
///
/// `center_shifted` is this rewrite's name for what the original engine
/// calls the "signed" flag: for 8-bit data it is always `true`, even though
/// 8-bit WAV samples are natively unsigned-center-128 — the flag only ever
/// drives the XOR-0x80 toggle between two representations, it does not
/// describe the true on-disk sign.
#[derive(Debug, Clone)]
pub struct PcmSound {
    pub container: Container,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub center_shifted: bool,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct TargetFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub center_shifted: bool,
}

const WAV_HEADER_LEN: usize = 44;

impl PcmSound {
    /// Detects a WAV container by magic bytes, falling back to the raw-PCM
    /// defaults (parameterized by `version`) when none is present.
    pub fn parse(bytes: &[u8], version: VersionGate) -> Result<Self> {
        if bytes.len() >= WAV_HEADER_LEN && &bytes[12..16] == b"fmt " && &bytes[36..40] == b"data"
        {
            if &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
                return Self::parse_wave(bytes, false);
            }
            if &bytes[0..4] == b"RIFX" && &bytes[8..12] == b"WAVE" {
                return Self::parse_wave(bytes, true);
            }
        }
        Self::parse_raw(bytes, version)
    }

    fn parse_wave(bytes: &[u8], big_endian: bool) -> Result<Self> {
        let u16_at = |at: usize| -> u16 {
            let b = [bytes[at], bytes[at + 1]];
            if big_endian {
                u16::from_be_bytes(b)
            } else {
                u16::from_le_bytes(b)
            }
        };
        let u32_at = |at: usize| -> u32 {
            let b = [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]];
            if big_endian {
                u32::from_be_bytes(b)
            } else {
                u32::from_le_bytes(b)
            }
        };

        let mut channels = u16_at(22);
        if channels == 0 {
            channels = 1;
        }
        let sample_rate = u32_at(24) & 0x7FFF_FFFF;
        let mut bits_per_sample = u16_at(34);
        bits_per_sample = if bits_per_sample < 8 {
            8
        } else if bits_per_sample > 8 {
            16
        } else {
            8
        };
        let data_size = (u32_at(40) & 0x7FFF_FFFF) as usize;

        let available = bytes.len().saturating_sub(WAV_HEADER_LEN);
        let data_size = data_size.min(available);
        let mut data = bytes[WAV_HEADER_LEN..WAV_HEADER_LEN + data_size].to_vec();

        if big_endian && bits_per_sample == 16 {
            for pair in data.chunks_exact_mut(2) {
                pair.swap(0, 1);
            }
        }

        Ok(PcmSound {
            container: if big_endian { Container::WaveBe } else { Container::Wave },
            channels,
            sample_rate,
            bits_per_sample,
            center_shifted: true,
            data,
        })
    }

    fn parse_raw(bytes: &[u8], version: VersionGate) -> Result<Self> {
        let widened = version >= VersionGate::Gtb;
        let bits_per_sample = if widened { 16 } else { 8 };
        Ok(PcmSound {
            container: Container::Raw,
            channels: 1,
            sample_rate: 22050,
            bits_per_sample,
            center_shifted: widened,
            data: bytes.to_vec(),
        })
    }

    pub fn info(&self) -> PcmInfo {
        let byte_rate = self.sample_rate as u64
            * self.channels as u64
            * self.bits_per_sample as u64
            / 8;
        let frame_size = (self.channels as usize * self.bits_per_sample as usize / 8).max(1);
        let sample_count = self.data.len() / frame_size;
        let duration_secs = if self.sample_rate > 0 {
            sample_count as f64 / self.sample_rate as f64
        } else {
            0.0
        };
        PcmInfo {
            container: self.container,
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            byte_rate,
            duration_secs,
        }
    }

    /// Runs the resample → channel-mix → bit-depth → signedness pipeline and
    /// returns raw sample bytes in `target`'s format (no container header).
    pub fn convert(&self, target: TargetFormat) -> Result<Vec<u8>> {
        if target.bits_per_sample != 8 && target.bits_per_sample != 16 {
            return Err(CoreError::UnsupportedFormat(format!(
                "unsupported target bit depth {}",
                target.bits_per_sample
            )));
        }

        let ch_in = self.channels.max(1) as usize;
        let samples = unpack_samples(&self.data, self.bits_per_sample);
        let frames_in: Vec<&[u16]> = samples.chunks(ch_in).filter(|c| c.len() == ch_in).collect();

        let resampled = resample_frames(&frames_in, self.sample_rate, target.sample_rate);

        let ch_out = target.channels.max(1) as usize;
        let mut out_samples: Vec<u16> = Vec::with_capacity(resampled.len() * ch_out);
        for frame in &resampled {
            let mixed = mix_channels(frame, ch_out);
            for sample in mixed {
                let depth_converted =
                    convert_bit_depth(sample, self.bits_per_sample, target.bits_per_sample);
                let signed_converted = if self.center_shifted != target.center_shifted {
                    toggle_sign(depth_converted, target.bits_per_sample)
                } else {
                    depth_converted
                };
                out_samples.push(signed_converted);
            }
        }

        Ok(pack_samples(&out_samples, target.bits_per_sample))
    }

    /// Channel count, sample rate, and bit depth preserved; always
    /// `center_shifted = true` on the target, matching the quirk that 8-bit
    /// WAV data is stored unsigned but carries the "signed" flag internally.
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        let target = TargetFormat {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            center_shifted: true,
        };
        let data = self.convert(target)?;
        Ok(build_wav(target.channels, target.sample_rate, target.bits_per_sample, &data))
    }

    /// Forced to mono 22050 Hz; bit depth comes from `version`.
    pub fn to_raw(&self, version: VersionGate) -> Result<Vec<u8>> {
        let bits_per_sample = if version >= VersionGate::Gtb { 16 } else { 8 };
        let target = TargetFormat {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample,
            center_shifted: bits_per_sample == 16,
        };
        self.convert(target)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PcmInfo {
    pub container: Container,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub byte_rate: u64,
    pub duration_secs: f64,
}

impl fmt::Display for PcmInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "container: {}", self.container)?;
        writeln!(f, "channels: {}", self.channels)?;
        writeln!(f, "sample_rate: {}", self.sample_rate)?;
        writeln!(f, "bits_per_sample: {}", self.bits_per_sample)?;
        writeln!(f, "byte_rate: {}", self.byte_rate)?;
        write!(f, "duration_secs: {:.3}", self.duration_secs)
    }
}

fn unpack_samples(data: &[u8], bits_per_sample: u16) -> Vec<u16> {
    if bits_per_sample == 8 {
        data.iter().map(|&b| b as u16).collect()
    } else {
        data.chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect()
    }
}

fn pack_samples(samples: &[u16], bits_per_sample: u16) -> Vec<u8> {
    if bits_per_sample == 8 {
        samples.iter().map(|&s| s as u8).collect()
    } else {
        samples.iter().flat_map(|&s| s.to_le_bytes()).collect()
    }
}

/// Integer Bresenham resampling: output frame count is
/// `floor(frames_in.len() * sr_out / sr_in)`, with the remainder carried in
/// the accumulator rather than rounded.
fn resample_frames<'a>(frames_in: &[&'a [u16]], sr_in: u32, sr_out: u32) -> Vec<&'a [u16]> {
    if sr_in == 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut acc: u64 = 0;
    for frame in frames_in {
        acc += sr_out as u64;
        while acc >= sr_in as u64 {
            acc -= sr_in as u64;
            out.push(*frame);
        }
    }
    out
}

fn mix_channels(frame: &[u16], ch_out: usize) -> Vec<u16> {
    if frame.len() == ch_out {
        return frame.to_vec();
    }
    let sum: u32 = frame.iter().map(|&s| s as u32).sum();
    let avg = (sum / frame.len().max(1) as u32) as u16;
    vec![avg; ch_out]
}

/// `sample` is always represented low-byte-first: an 8-bit sample occupies
/// the low byte with the high byte zero, a 16-bit sample occupies the full
/// word.
fn convert_bit_depth(sample: u16, bits_in: u16, bits_out: u16) -> u16 {
    match (bits_in, bits_out) {
        (8, 16) => {
            let shifted = (sample & 0xFF) << 8;
            if shifted & 0x100 != 0 {
                shifted | 0x00FF
            } else {
                shifted
            }
        }
        (16, 8) => (sample >> 8) & 0xFF,
        _ => sample,
    }
}

fn toggle_sign(sample: u16, bits: u16) -> u16 {
    if bits == 8 {
        (sample ^ 0x80) & 0xFF
    } else {
        sample ^ 0x8000
    }
}

fn build_wav(channels: u16, sample_rate: u32, bits_per_sample: u16, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + data.len());
    let data_size = data.len() as u32;
    let byte_rate = sample_rate * channels as u32 * bits_per_sample as u32 / 8;
    let block_align = channels * bits_per_sample / 8;

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_size).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());
    out.extend_from_slice(data);

    patch_wav_sizes(&mut out);
    out
}

/// Patches the RIFF and data chunk sizes to match the buffer's actual
/// length, in case the header was written against a size estimate.
fn patch_wav_sizes(buf: &mut [u8]) {
    if buf.len() < WAV_HEADER_LEN {
        return;
    }
    let total = buf.len();
    let riff_size = (total - 8) as u32;
    let data_size = (total - WAV_HEADER_LEN) as u32;
    buf[4..8].copy_from_slice(&riff_size.to_le_bytes());
    buf[40..44].copy_from_slice(&data_size.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_pcm_below_gtb_defaults_to_8_bit_unsigned() {
        let sound = PcmSound::parse(&[1, 2, 3], VersionGate::PreGtb).unwrap();
        assert_eq!(sound.bits_per_sample, 8);
        assert!(!sound.center_shifted);
        assert_eq!(sound.channels, 1);
        assert_eq!(sound.sample_rate, 22050);
    }

    #[test]
    fn raw_pcm_at_gtb_defaults_to_16_bit_signed() {
        let sound = PcmSound::parse(&[1, 2, 3, 4], VersionGate::Gtb).unwrap();
        assert_eq!(sound.bits_per_sample, 16);
        assert!(sound.center_shifted);
    }

    #[test]
    fn scenario_raw_to_wav_sizes() {
        let data = vec![0x80u8; 4410];
        let sound = PcmSound::parse(&data, VersionGate::Unrestricted).unwrap();
        let wav = sound.to_wav().unwrap();
        assert_eq!(wav.len(), 4454);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 4446);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 4410);
    }

    #[test]
    fn identity_conversion_preserves_bytes() {
        let data: Vec<u8> = (0..64).collect();
        let sound = PcmSound {
            container: Container::Raw,
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            center_shifted: true,
            data: data.clone(),
        };
        let target = TargetFormat {
            channels: sound.channels,
            sample_rate: sound.sample_rate,
            bits_per_sample: sound.bits_per_sample,
            center_shifted: sound.center_shifted,
        };
        let converted = sound.convert(target).unwrap();
        assert_eq!(converted, data);
    }

    #[test]
    fn resample_frame_count_matches_formula() {
        let owned: Vec<[u16; 1]> = (0..1000u16).map(|s| [s]).collect();
        let refs: Vec<&[u16]> = owned.iter().map(|f| f.as_slice()).collect();
        let out = resample_frames(&refs, 22050, 11025);
        assert_eq!(out.len(), (1000 * 11025) / 22050);
    }

    #[test]
    fn widen_then_narrow_round_trips_heuristic() {
        // 0x01 has its LSB set, so widening sign-extends the low byte to 0xFF.
        assert_eq!(convert_bit_depth(0x01, 8, 16), 0x01FF);
        // 0x02 does not, so the low byte stays zero.
        assert_eq!(convert_bit_depth(0x02, 8, 16), 0x0200);
        assert_eq!(convert_bit_depth(0x01FF, 16, 8), 0x01);
    }

    #[test]
    fn riffx_swaps_16_bit_samples_to_internal_le() {
        let mut bytes = vec![0u8; WAV_HEADER_LEN + 4];
        bytes[0..4].copy_from_slice(b"RIFX");
        bytes[8..12].copy_from_slice(b"WAVE");
        bytes[12..16].copy_from_slice(b"fmt ");
        bytes[36..40].copy_from_slice(b"data");
        bytes[22..24].copy_from_slice(&1u16.to_be_bytes());
        bytes[24..28].copy_from_slice(&22050u32.to_be_bytes());
        bytes[34..36].copy_from_slice(&16u16.to_be_bytes());
        bytes[40..44].copy_from_slice(&4u32.to_be_bytes());
        bytes[44..48].copy_from_slice(&[0x00, 0x01, 0x02, 0x03]);

        let sound = PcmSound::parse(&bytes, VersionGate::Unrestricted).unwrap();
        assert_eq!(sound.container, Container::WaveBe);
        assert_eq!(sound.data, vec![0x01, 0x00, 0x03, 0x02]);
    }
}
