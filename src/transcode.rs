//! Audio normalization: wire codec bytes in, 16kHz mono PCM16 WAV out.

use crate::defaults::WAV_SAMPLE_RATE;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum TranscodeError {
    #[error("Failed to decode chunk audio: {message}")]
    Decode { message: String },

    #[error("Chunk contains no decodable audio")]
    EmptyAudio,

    #[error("Failed to encode WAV: {message}")]
    Encode { message: String },
}

/// Normalizes one captured chunk for storage.
pub trait AudioTranscoder: Send + Sync {
    /// Decodes wire-format bytes into 16kHz mono PCM samples.
    fn decode(&self, bytes: &[u8]) -> Result<Vec<i16>, TranscodeError>;

    /// Encodes 16kHz mono PCM samples as a WAV container.
    fn encode(&self, samples: &[i16]) -> Result<Vec<u8>, TranscodeError>;

    /// Full normalization: decode then encode.
    fn transcode(&self, bytes: &[u8]) -> Result<Vec<u8>, TranscodeError> {
        let samples = self.decode(bytes)?;
        self.encode(&samples)
    }
}

/// Symphonia-backed transcoder.
///
/// Decodes whatever codec the stream carries (mp3 for the default source),
/// downmixes to mono, resamples to 16kHz, and writes PCM16 WAV via hound.
pub struct SymphoniaTranscoder {
    /// Format hint for the probe, e.g. "mp3".
    source_format: String,
}

impl SymphoniaTranscoder {
    pub fn new(source_format: impl Into<String>) -> Self {
        Self {
            source_format: source_format.into(),
        }
    }

    /// Decodes to interleaved f32 samples plus the stream's rate and channel
    /// count. Corrupt packets are skipped; a chunk sliced from a live stream
    /// rarely starts on a frame boundary.
    fn decode_interleaved(&self, bytes: &[u8]) -> Result<(Vec<f32>, u32, usize), TranscodeError> {
        let decode_err = |e: SymphoniaError| TranscodeError::Decode {
            message: e.to_string(),
        };

        let mss = MediaSourceStream::new(
            Box::new(Cursor::new(bytes.to_vec())),
            Default::default(),
        );
        let mut hint = Hint::new();
        hint.with_extension(&self.source_format);

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(decode_err)?;

        let mut format = probed.format;
        let track = format.default_track().ok_or(TranscodeError::EmptyAudio)?;
        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or(TranscodeError::EmptyAudio)?;
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count())
            .ok_or(TranscodeError::EmptyAudio)?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(decode_err)?;

        let mut samples: Vec<f32> = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => return Err(decode_err(e)),
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let capacity = decoded.capacity() as u64;
                    let mut buf = SampleBuffer::<f32>::new(capacity, spec);
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
                Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => return Err(decode_err(e)),
            }
        }

        if samples.is_empty() {
            return Err(TranscodeError::EmptyAudio);
        }
        Ok((samples, sample_rate, channels))
    }
}

impl AudioTranscoder for SymphoniaTranscoder {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<i16>, TranscodeError> {
        let (interleaved, sample_rate, channels) = self.decode_interleaved(bytes)?;
        let mono = downmix(&interleaved, channels);
        let resampled = resample(&mono, sample_rate, WAV_SAMPLE_RATE);
        Ok(resampled.iter().map(|&s| to_i16(s)).collect())
    }

    fn encode(&self, samples: &[i16]) -> Result<Vec<u8>, TranscodeError> {
        let encode_err = |e: hound::Error| TranscodeError::Encode {
            message: e.to_string(),
        };

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: WAV_SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(encode_err)?;
            for &sample in samples {
                writer.write_sample(sample).map_err(encode_err)?;
            }
            writer.finalize().map_err(encode_err)?;
        }
        Ok(cursor.into_inner())
    }
}

/// Averages interleaved channels down to mono.
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear interpolation resampling.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos as usize;
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx.min(samples.len() - 1)];
            let b = samples[(idx + 1).min(samples.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
