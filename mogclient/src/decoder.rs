//! Audio decoding collaborator
//!
//! The stream toggle only hands raw payloads over; what happens to them is
//! up to the [`AudioDecoder`] implementation.

use bytes::Bytes;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio::sync::mpsc;

/// Consumer of complete encoded audio payloads
///
/// Called from a blocking worker thread, so implementations may do heavy work
/// inline.
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, payload: Bytes);
}

/// PCM ready for playback
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub channels: usize,
    /// Interleaved samples
    pub samples: Vec<f32>,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }
}

/// Decodes a whole in-memory payload with symphonia
///
/// The container is sniffed from the data itself. Corrupt packets are skipped.
pub fn decode_payload(payload: Bytes) -> Result<DecodedAudio, SymphoniaError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(payload)), Default::default());

    let probed = symphonia::default::get_probe().format(
        &Hint::new(),
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or(SymphoniaError::Unsupported("no default track"))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(e),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count();
                let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                sample_buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(sample_buf.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!("Skipping corrupt packet: {}", e);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(DecodedAudio {
        sample_rate,
        channels,
        samples,
    })
}

/// [`AudioDecoder`] that decodes with symphonia and forwards the PCM
/// on a channel
pub struct SymphoniaDecoder {
    tx: mpsc::UnboundedSender<DecodedAudio>,
}

impl SymphoniaDecoder {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DecodedAudio>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, payload: Bytes) {
        let len = payload.len();
        match decode_payload(payload) {
            Ok(audio) => {
                tracing::debug!(
                    bytes = len,
                    sample_rate = audio.sample_rate,
                    channels = audio.channels,
                    "Decoded {:.1}s of audio",
                    audio.duration_secs()
                );
                if self.tx.send(audio).is_err() {
                    tracing::debug!("Decoded audio dropped, receiver is gone");
                }
            }
            Err(e) => tracing::warn!(bytes = len, "Could not decode stream payload: {}", e),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal 16-bit PCM WAV file
    pub(crate) fn wav_bytes(sample_rate: u32, channels: u16, frames: usize) -> Bytes {
        let block_align = channels * 2;
        let data_len = frames as u32 * block_align as u32;
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for i in 0..frames * channels as usize {
            let sample = ((i % 64) as i16 - 32) * 256;
            out.extend_from_slice(&sample.to_le_bytes());
        }
        Bytes::from(out)
    }

    #[test]
    fn test_decode_wav_payload() {
        let audio = decode_payload(wav_bytes(8000, 2, 800)).unwrap();
        assert_eq!(audio.sample_rate, 8000);
        assert_eq!(audio.channels, 2);
        assert_eq!(audio.frames(), 800);
        assert!((audio.duration_secs() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode_payload(Bytes::from_static(b"definitely not audio")).is_err());
    }

    #[test]
    fn test_symphonia_decoder_forwards_pcm() {
        let (decoder, mut rx) = SymphoniaDecoder::new();
        decoder.decode(wav_bytes(44100, 1, 441));
        let audio = rx.try_recv().unwrap();
        assert_eq!(audio.channels, 1);
        assert_eq!(audio.frames(), 441);
    }

    #[test]
    fn test_symphonia_decoder_swallows_errors() {
        let (decoder, mut rx) = SymphoniaDecoder::new();
        decoder.decode(Bytes::from_static(b"junk"));
        assert!(rx.try_recv().is_err());
    }
}
