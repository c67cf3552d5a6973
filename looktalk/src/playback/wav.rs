//! RIFF/WAVE header parsing.
//!
//! Layout handled:
//!
//! ```text
//! offset  size  field
//!   0      4    "RIFF"
//!   4      4    riff size (ignored, streams often lie)
//!   8      4    "WAVE"
//!  12      …    chunks: 4-byte id, 4-byte LE size, body, pad to even
//!               "fmt " (≥16 bytes) must precede "data"
//!               anything else is skipped
//! ```
//!
//! Parsing stops at the `data` chunk header; everything after it is PCM.

use crate::constants::{MAX_STREAM_RATE, MIN_STREAM_RATE, WAV_MIN_HEADER_BYTES};

use super::DecodeError;

const FORMAT_PCM: u16 = 1;

/// Stream parameters from the `fmt ` and `data` chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    /// Declared payload length; 0 or `u32::MAX` when the sender streams.
    pub data_len: u32,
}

impl WavFormat {
    /// The one playable layout: 16-bit mono PCM.
    pub fn pcm16_mono(sample_rate: u32, data_len: u32) -> Self {
        WavFormat {
            audio_format: FORMAT_PCM,
            channels: 1,
            sample_rate,
            byte_rate: sample_rate * 2,
            block_align: 2,
            bits_per_sample: 16,
            data_len,
        }
    }

    /// Only 16-bit mono PCM between 8 and 48 kHz is playable.
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.audio_format != FORMAT_PCM {
            return Err(DecodeError::Unsupported {
                field: "encoding",
                value: u32::from(self.audio_format),
            });
        }
        if self.channels != 1 {
            return Err(DecodeError::Unsupported {
                field: "channels",
                value: u32::from(self.channels),
            });
        }
        if self.bits_per_sample != 16 {
            return Err(DecodeError::Unsupported {
                field: "bits per sample",
                value: u32::from(self.bits_per_sample),
            });
        }
        if !(MIN_STREAM_RATE..=MAX_STREAM_RATE).contains(&self.sample_rate) {
            return Err(DecodeError::Unsupported {
                field: "sample rate",
                value: self.sample_rate,
            });
        }
        let expected_align = self.channels * (self.bits_per_sample / 8);
        if self.block_align != expected_align {
            return Err(DecodeError::Unsupported {
                field: "block align",
                value: u32::from(self.block_align),
            });
        }
        Ok(())
    }

    /// Payload length to honor, if the header declared a real one.
    pub fn declared_payload(&self) -> Option<usize> {
        match self.data_len {
            0 | u32::MAX => None,
            n => Some(n as usize),
        }
    }
}

/// Outcome of scanning a partial header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderScan {
    /// More bytes are needed.
    Incomplete,
    /// PCM starts at `header_len`.
    Complete { format: WavFormat, header_len: usize },
}

fn le_u16(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn le_u32(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

/// Scan `buf`, which holds the stream from its first byte.
pub fn scan_header(buf: &[u8]) -> Result<HeaderScan, DecodeError> {
    if buf.len() >= 12 && (&buf[0..4] != b"RIFF" || &buf[8..12] != b"WAVE") {
        return Err(DecodeError::BadSignature);
    }
    if buf.len() < WAV_MIN_HEADER_BYTES {
        return Ok(HeaderScan::Incomplete);
    }

    let mut fmt: Option<WavFormat> = None;
    let mut pos = 12;
    while pos + 8 <= buf.len() {
        let id = &buf[pos..pos + 4];
        let size = le_u32(buf, pos + 4);
        let body = pos + 8;

        if id == b"data" {
            let mut format = fmt.ok_or(DecodeError::MissingFmt)?;
            format.data_len = size;
            return Ok(HeaderScan::Complete {
                format,
                header_len: body,
            });
        }

        // Chunk bodies are padded to an even length.
        let padded = (size as usize).saturating_add((size & 1) as usize);
        let next = body.saturating_add(padded);

        if id == b"fmt " {
            if size < 16 {
                return Err(DecodeError::MalformedFmt(size));
            }
            if body + 16 > buf.len() {
                return Ok(HeaderScan::Incomplete);
            }
            fmt = Some(WavFormat {
                audio_format: le_u16(buf, body),
                channels: le_u16(buf, body + 2),
                sample_rate: le_u32(buf, body + 4),
                byte_rate: le_u32(buf, body + 8),
                block_align: le_u16(buf, body + 12),
                bits_per_sample: le_u16(buf, body + 14),
                data_len: 0,
            });
        }
        pos = next;
    }
    Ok(HeaderScan::Incomplete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::wav_header;
    use alloc::vec::Vec;

    #[test]
    fn canonical_header_is_44_bytes() {
        let h = wav_header(16_000, 1, 16, 1000);
        assert_eq!(
            scan_header(&h),
            Ok(HeaderScan::Complete {
                format: WavFormat {
                    audio_format: 1,
                    channels: 1,
                    sample_rate: 16_000,
                    byte_rate: 32_000,
                    block_align: 2,
                    bits_per_sample: 16,
                    data_len: 1000,
                },
                header_len: 44,
            })
        );
    }

    #[test]
    fn every_prefix_is_incomplete() {
        let h = wav_header(16_000, 1, 16, 0);
        for n in 0..h.len() {
            assert_eq!(scan_header(&h[..n]), Ok(HeaderScan::Incomplete), "prefix {}", n);
        }
    }

    #[test]
    fn unknown_chunks_are_skipped_with_padding() {
        let h = wav_header(24_000, 1, 16, 0);
        let mut with_list = Vec::new();
        with_list.extend_from_slice(&h[..36]); // RIFF + fmt chunk
        with_list.extend_from_slice(b"LIST");
        with_list.extend_from_slice(&5u32.to_le_bytes());
        with_list.extend_from_slice(b"abcde\0"); // 5 bytes + pad
        with_list.extend_from_slice(&h[36..]); // data header
        match scan_header(&with_list) {
            Ok(HeaderScan::Complete { format, header_len }) => {
                assert_eq!(header_len, 58);
                assert_eq!(format.sample_rate, 24_000);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn bad_signature_is_rejected_early() {
        let mut h = wav_header(16_000, 1, 16, 0);
        h[0] = b'X';
        assert_eq!(scan_header(&h[..12]), Err(DecodeError::BadSignature));
    }

    #[test]
    fn short_fmt_chunk_is_malformed() {
        let mut h = wav_header(16_000, 1, 16, 0);
        h[16..20].copy_from_slice(&12u32.to_le_bytes());
        assert_eq!(scan_header(&h), Err(DecodeError::MalformedFmt(12)));
    }

    #[test]
    fn data_before_fmt_is_rejected() {
        let mut h = Vec::new();
        h.extend_from_slice(b"RIFF");
        h.extend_from_slice(&0u32.to_le_bytes());
        h.extend_from_slice(b"WAVE");
        h.extend_from_slice(b"data");
        h.extend_from_slice(&0u32.to_le_bytes());
        h.extend_from_slice(&[0u8; 24]);
        assert_eq!(scan_header(&h), Err(DecodeError::MissingFmt));
    }

    #[test]
    fn validation_limits_format() {
        let ok = WavFormat {
            audio_format: 1,
            channels: 1,
            sample_rate: 16_000,
            byte_rate: 32_000,
            block_align: 2,
            bits_per_sample: 16,
            data_len: 0,
        };
        assert_eq!(ok.validate(), Ok(()));
        assert!(WavFormat { channels: 2, block_align: 4, ..ok }.validate().is_err());
        assert!(WavFormat { bits_per_sample: 8, block_align: 1, ..ok }.validate().is_err());
        assert!(WavFormat { audio_format: 3, ..ok }.validate().is_err());
        assert!(WavFormat { sample_rate: 4_000, ..ok }.validate().is_err());
        assert!(WavFormat { block_align: 3, ..ok }.validate().is_err());
        assert_eq!(ok.declared_payload(), None);
        assert_eq!(WavFormat { data_len: 10, ..ok }.declared_payload(), Some(10));
    }
}
