//! Audio frame types shared across the ingestion and recognizer crates.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sample rates the pipeline knows how to reason about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleRate {
    /// 8kHz - Telephony
    Hz8000,
    /// 16kHz - Standard speech recognition (STT default)
    Hz16000,
    /// 44.1kHz - CD quality
    Hz44100,
    /// 48kHz - Professional audio (typical WebRTC capture rate)
    Hz48000,
    /// Any other rate, carried verbatim (e.g. a browser-negotiated RTP clock rate)
    Other(u32),
}

impl SampleRate {
    pub fn as_u32(&self) -> u32 {
        match self {
            SampleRate::Hz8000 => 8000,
            SampleRate::Hz16000 => 16000,
            SampleRate::Hz44100 => 44100,
            SampleRate::Hz48000 => 48000,
            SampleRate::Other(hz) => *hz,
        }
    }

    pub fn from_u32(hz: u32) -> Self {
        match hz {
            8000 => SampleRate::Hz8000,
            16000 => SampleRate::Hz16000,
            44100 => SampleRate::Hz44100,
            48000 => SampleRate::Hz48000,
            other => SampleRate::Other(other),
        }
    }
}

/// Audio channel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Channels {
    #[default]
    Mono,
    Stereo,
    Other(u16),
}

impl Channels {
    pub fn count(&self) -> usize {
        match self {
            Channels::Mono => 1,
            Channels::Stereo => 2,
            Channels::Other(n) => *n as usize,
        }
    }
}

/// A decoded block of audio samples flowing out of the WebRTC inbound track,
/// before resampling/mono-mixing/chunking by the audio pipeline.
///
/// Samples are stored as `f32` normalized to `[-1.0, 1.0]`, mirroring how the
/// peer-connection's decoder hands frames to the pipeline.
#[derive(Clone)]
pub struct AudioFrame {
    pub samples: Arc<[f32]>,
    pub sample_rate: SampleRate,
    pub channels: Channels,
    pub sequence: u64,
    pub timestamp: Instant,
    pub duration: Duration,
}

impl std::fmt::Debug for AudioFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioFrame")
            .field("samples_len", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("sequence", &self.sequence)
            .field("duration", &self.duration)
            .finish()
    }
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: SampleRate, channels: Channels, sequence: u64) -> Self {
        let duration = Duration::from_secs_f64(
            samples.len() as f64 / (sample_rate.as_u32().max(1) as f64 * channels.count() as f64),
        );
        Self {
            samples: samples.into(),
            sample_rate,
            channels,
            sequence,
            timestamp: Instant::now(),
            duration,
        }
    }

    /// Mixes interleaved multi-channel samples down to mono by averaging.
    pub fn to_mono(&self) -> Self {
        if self.channels == Channels::Mono {
            return self.clone();
        }
        let n = self.channels.count();
        let mono: Vec<f32> = self
            .samples
            .chunks_exact(n)
            .map(|frame| frame.iter().sum::<f32>() / n as f32)
            .collect();
        Self::new(mono, self.sample_rate, Channels::Mono, self.sequence)
    }

    /// High-quality resampling using Rubato's FFT-based resampler, falling
    /// back to linear interpolation for frames too short to seed the FFT
    /// resampler (first/last partial frame of a session).
    pub fn resample(&self, target_rate: SampleRate) -> Self {
        use rubato::{FftFixedIn, Resampler};

        if self.sample_rate.as_u32() == target_rate.as_u32() {
            return self.clone();
        }

        let from_rate = self.sample_rate.as_u32() as usize;
        let to_rate = target_rate.as_u32() as usize;
        let samples_f64: Vec<f64> = self.samples.iter().map(|&s| s as f64).collect();

        if self.samples.len() < 64 {
            return self.resample_linear(target_rate);
        }

        let chunk_size = self.samples.len().min(1024);
        match FftFixedIn::<f64>::new(from_rate, to_rate, chunk_size, 2, 1) {
            Ok(mut resampler) => match resampler.process(&[samples_f64], None) {
                Ok(output_frames) => {
                    let resampled: Vec<f32> = output_frames[0].iter().map(|&s| s as f32).collect();
                    Self::new(resampled, target_rate, self.channels, self.sequence)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "rubato resample failed, using linear fallback");
                    self.resample_linear(target_rate)
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "rubato resampler construction failed, using linear fallback");
                self.resample_linear(target_rate)
            }
        }
    }

    fn resample_linear(&self, target_rate: SampleRate) -> Self {
        let from_rate = self.sample_rate.as_u32() as f64;
        let to_rate = target_rate.as_u32() as f64;
        if from_rate == 0.0 || self.samples.is_empty() {
            return Self::new(Vec::new(), target_rate, self.channels, self.sequence);
        }
        let ratio = to_rate / from_rate;
        let out_len = ((self.samples.len() as f64) * ratio).round() as usize;
        let mut out = Vec::with_capacity(out_len);
        for i in 0..out_len {
            let src_pos = i as f64 / ratio;
            let idx = src_pos.floor() as usize;
            let frac = src_pos - idx as f64;
            let a = *self.samples.get(idx).unwrap_or(&0.0);
            let b = *self.samples.get(idx + 1).unwrap_or(&a);
            out.push((a as f64 + (b as f64 - a as f64) * frac) as f32);
        }
        Self::new(out, target_rate, self.channels, self.sequence)
    }

    /// Converts to little-endian signed 16-bit PCM bytes.
    pub fn to_pcm16(&self) -> Vec<u8> {
        const PCM16_SCALE: f32 = 32767.0;
        self.samples
            .iter()
            .flat_map(|&sample| {
                let clamped = sample.clamp(-1.0, 1.0);
                let pcm16 = (clamped * PCM16_SCALE) as i16;
                pcm16.to_le_bytes()
            })
            .collect()
    }

    /// Builds a frame from little-endian signed 16-bit PCM bytes.
    pub fn from_pcm16(bytes: &[u8], sample_rate: SampleRate, channels: Channels, sequence: u64) -> Self {
        const PCM16_NORMALIZE: f32 = 32768.0;
        let samples: Vec<f32> = bytes
            .chunks_exact(2)
            .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / PCM16_NORMALIZE)
            .collect();
        Self::new(samples, sample_rate, channels, sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm16_roundtrip_is_close() {
        let samples = vec![0.5_f32, -0.5, 0.0, 0.25];
        let frame = AudioFrame::new(samples.clone(), SampleRate::Hz16000, Channels::Mono, 0);
        let bytes = frame.to_pcm16();
        let back = AudioFrame::from_pcm16(&bytes, SampleRate::Hz16000, Channels::Mono, 0);
        for (a, b) in samples.iter().zip(back.samples.iter()) {
            assert!((a - b).abs() < 0.001);
        }
    }

    #[test]
    fn stereo_to_mono_averages_channels() {
        let samples = vec![1.0_f32, -1.0, 0.5, 0.5];
        let frame = AudioFrame::new(samples, SampleRate::Hz48000, Channels::Stereo, 0);
        let mono = frame.to_mono();
        assert_eq!(mono.channels, Channels::Mono);
        assert_eq!(mono.samples.len(), 2);
        assert!((mono.samples[0] - 0.0).abs() < 1e-6);
        assert!((mono.samples[1] - 0.5).abs() < 1e-6);
    }
}
