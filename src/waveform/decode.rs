use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::progress::ProgressHandle;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("cancelled")]
    Cancelled,
    #[error("strategy does not handle .{0} files")]
    WrongExtension(String),
    #[error("no decodable audio track")]
    NoAudioTrack,
    #[error("decoder error: {0}")]
    Decoder(String),
    #[error("malformed WAV container: {0}")]
    MalformedWav(&'static str),
    #[error("unsupported WAV sample width: {0} bytes")]
    UnsupportedSampleWidth(u16),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Interleaved PCM decoded to f32 in [-1, 1].
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: usize,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }
}

type Strategy = fn(&Path, &dyn ProgressHandle) -> Result<DecodedAudio, DecodeError>;

/// Ranked decode strategies. The first to produce non-empty samples wins;
/// the rest never run. Order matters: the general-purpose decoder first,
/// then the WAV container parser, then raw FLAC sample reads.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("symphonia", decode_any),
    ("wav", decode_wav),
    ("claxon", decode_flac_raw),
];

// Cancellation is polled once per this many decode iterations.
const CANCEL_POLL_INTERVAL: usize = 64;

/// Decode a file to PCM, trying each strategy in rank order. `None` means
/// every strategy failed or produced nothing — callers treat the waveform
/// as unavailable, not as an error.
pub fn decode_samples(path: &Path, progress: &dyn ProgressHandle) -> Option<DecodedAudio> {
    for (name, strategy) in STRATEGIES {
        match strategy(path, progress) {
            Ok(audio) if audio.samples.is_empty() => {
                log::debug!("{name} produced no samples for {}", path.display());
            }
            Ok(audio) => return Some(audio),
            Err(DecodeError::Cancelled) => return None,
            Err(e) => {
                log::debug!("{name} failed for {}: {}", path.display(), e);
            }
        }
    }
    None
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Strategy 1: symphonia probe + default codec registry, any format.
fn decode_any(path: &Path, progress: &dyn ProgressHandle) -> Result<DecodedAudio, DecodeError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::Decoder(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Decoder(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut packets = 0usize;

    loop {
        packets += 1;
        if packets % CANCEL_POLL_INTERVAL == 0 && progress.is_cancelled() {
            return Err(DecodeError::Cancelled);
        }

        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Decoder(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A bad packet is not a bad file; skip it and keep going.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(DecodeError::Decoder(e.to_string())),
        };

        let spec = *decoded.spec();
        let frames = decoded.frames() as u64;
        if frames == 0 {
            continue;
        }
        if channels == 0 {
            // Some streams only reveal their layout once decoding starts.
            channels = spec.channels.count();
        }

        let buf = match &mut sample_buf {
            Some(buf) if buf.capacity() as u64 >= frames * spec.channels.count() as u64 => buf,
            _ => sample_buf.insert(SampleBuffer::new(frames, spec)),
        };
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    Ok(DecodedAudio {
        samples,
        channels: channels.max(1),
    })
}

/// Strategy 2: manual RIFF/WAVE parsing for files symphonia rejected.
fn decode_wav(path: &Path, _progress: &dyn ProgressHandle) -> Result<DecodedAudio, DecodeError> {
    let ext = extension_of(path);
    if ext != "wav" {
        return Err(DecodeError::WrongExtension(ext));
    }
    let bytes = std::fs::read(path)?;
    parse_wav(&bytes)
}

/// Parse a WAV container: walk the chunk list for `fmt ` and `data`, then
/// reinterpret the payload at the declared sample width. Widths of 1, 2 and
/// 4 bytes map to signed little-endian integers scaled to [-1, 1]; anything
/// else is rejected.
pub(crate) fn parse_wav(bytes: &[u8]) -> Result<DecodedAudio, DecodeError> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(DecodeError::MalformedWav("missing RIFF/WAVE header"));
    }

    let mut channels: Option<u16> = None;
    let mut sample_width: Option<u16> = None;
    let mut data: Option<&[u8]> = None;

    let mut offset = 12usize;
    while offset + 8 <= bytes.len() {
        let id = &bytes[offset..offset + 4];
        let chunk_size = u32::from_le_bytes(
            bytes[offset + 4..offset + 8]
                .try_into()
                .map_err(|_| DecodeError::MalformedWav("bad chunk size"))?,
        ) as usize;
        let body_start = offset + 8;
        let body_end = body_start.saturating_add(chunk_size).min(bytes.len());

        match id {
            b"fmt " => {
                let body = &bytes[body_start..body_end];
                if body.len() < 16 {
                    return Err(DecodeError::MalformedWav("short fmt chunk"));
                }
                channels = Some(u16::from_le_bytes([body[2], body[3]]));
                let bits = u16::from_le_bytes([body[14], body[15]]);
                sample_width = Some(bits.div_ceil(8));
            }
            b"data" => {
                data = Some(&bytes[body_start..body_end]);
            }
            _ => {}
        }

        // Chunks are word-aligned; odd sizes carry a pad byte.
        let mut next = body_start.saturating_add(chunk_size);
        if chunk_size % 2 == 1 {
            next = next.saturating_add(1);
        }
        if next <= offset {
            break;
        }
        offset = next;
    }

    let channels = channels.ok_or(DecodeError::MalformedWav("no fmt chunk"))?.max(1);
    let width = sample_width.ok_or(DecodeError::MalformedWav("no fmt chunk"))?;
    let data = data.ok_or(DecodeError::MalformedWav("no data chunk"))?;

    let samples = match width {
        1 => data.iter().map(|&b| b as i8 as f32 / 128.0).collect(),
        2 => data
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / 32_768.0)
            .collect(),
        4 => data
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f32 / 2_147_483_648.0)
            .collect(),
        other => return Err(DecodeError::UnsupportedSampleWidth(other)),
    };

    Ok(DecodedAudio {
        samples,
        channels: channels as usize,
    })
}

/// Strategy 3: claxon raw FLAC samples, normalized by the stream bit depth.
fn decode_flac_raw(
    path: &Path,
    progress: &dyn ProgressHandle,
) -> Result<DecodedAudio, DecodeError> {
    let ext = extension_of(path);
    if ext != "flac" {
        return Err(DecodeError::WrongExtension(ext));
    }

    let mut reader =
        claxon::FlacReader::open(path).map_err(|e| DecodeError::Decoder(e.to_string()))?;
    let info = reader.streaminfo();
    let channels = info.channels.max(1) as usize;
    let scale = (1i64 << (info.bits_per_sample.clamp(1, 32) - 1)) as f32;

    let mut samples = Vec::new();
    for (index, sample) in reader.samples().enumerate() {
        if index % (CANCEL_POLL_INTERVAL * 1024) == 0 && progress.is_cancelled() {
            return Err(DecodeError::Cancelled);
        }
        let sample = sample.map_err(|e| DecodeError::Decoder(e.to_string()))?;
        samples.push(sample as f32 / scale);
    }

    Ok(DecodedAudio { samples, channels })
}

/// Build a minimal PCM WAV (header, fmt chunk, data chunk) for tests.
#[cfg(test)]
pub(crate) fn build_wav(channels: u16, bits: u16, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    let fmt_len = 16u32;
    let riff_len = 4 + (8 + fmt_len) + (8 + payload.len() as u32);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&riff_len.to_le_bytes());
    bytes.extend_from_slice(b"WAVE");

    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&fmt_len.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&44_100u32.to_le_bytes());
    let byte_rate = 44_100 * channels as u32 * (bits as u32 / 8);
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&(channels * (bits / 8)).to_le_bytes());
    bytes.extend_from_slice(&bits.to_le_bytes());

    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::Silent;

    #[test]
    fn parses_16_bit_mono_wav() {
        let payload: Vec<u8> = [0i16, 16_384, -16_384, 32_767]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let audio = parse_wav(&build_wav(1, 16, &payload)).unwrap();
        assert_eq!(audio.channels, 1);
        assert_eq!(audio.frames(), 4);
        assert!((audio.samples[1] - 0.5).abs() < 1e-4);
        assert!((audio.samples[2] + 0.5).abs() < 1e-4);
    }

    #[test]
    fn parses_8_and_32_bit_widths() {
        let audio = parse_wav(&build_wav(1, 8, &[0x00, 0x40, 0x80])).unwrap();
        assert_eq!(audio.frames(), 3);
        assert!((audio.samples[1] - 0.5).abs() < 1e-4);

        let payload: Vec<u8> = i32::MAX.to_le_bytes().to_vec();
        let audio = parse_wav(&build_wav(1, 32, &payload)).unwrap();
        assert_eq!(audio.frames(), 1);
        assert!((audio.samples[0] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn rejects_unknown_sample_widths() {
        let result = parse_wav(&build_wav(1, 24, &[0u8; 6]));
        assert!(matches!(
            result,
            Err(DecodeError::UnsupportedSampleWidth(3))
        ));
    }

    #[test]
    fn rejects_non_riff_bytes() {
        assert!(matches!(
            parse_wav(b"OggS junk that is not a wav file"),
            Err(DecodeError::MalformedWav(_))
        ));
        assert!(matches!(
            parse_wav(&[]),
            Err(DecodeError::MalformedWav(_))
        ));
    }

    #[test]
    fn stereo_frames_count_pairs() {
        let payload: Vec<u8> = [100i16, -100, 200, -200]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let audio = parse_wav(&build_wav(2, 16, &payload)).unwrap();
        assert_eq!(audio.channels, 2);
        assert_eq!(audio.frames(), 2);
    }

    #[test]
    fn ranked_walk_decodes_a_plain_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let payload: Vec<u8> = (0..64i16).flat_map(|s| (s * 512).to_le_bytes()).collect();
        std::fs::write(&path, build_wav(1, 16, &payload)).unwrap();

        let audio = decode_samples(&path, &Silent).unwrap();
        assert_eq!(audio.frames(), 64);
    }

    #[test]
    fn undecodable_file_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, [0u8; 32]).unwrap();
        assert!(decode_samples(&path, &Silent).is_none());
    }

    #[test]
    fn zero_byte_file_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        std::fs::write(&path, b"").unwrap();
        assert!(decode_samples(&path, &Silent).is_none());
    }
}
