//! Audio pipeline (C3): resample/mono-mix inbound frames, optionally
//! denoise, chunk into the bounded PCM queue the recognizer worker drains,
//! and tee the same PCM to WAV capture files.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use stt_gateway_core::audio::{AudioFrame, SampleRate};
use tokio::sync::mpsc;

use crate::denoise::NoiseReducer;
use crate::PipelineError;

/// Bounded PCM queue capacity. The audio callback never blocks: on overflow
/// the newest chunk is dropped and `dropped_chunks` increments.
pub const PCM_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct AudioPipelineConfig {
    pub session_id: String,
    pub stt_sample_rate: u32,
    pub storage_dir: PathBuf,
    pub analysis_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AudioStats {
    pub bytes: u64,
    pub chunks: u64,
    pub dropped_chunks: u64,
}

struct WavTee {
    storage: Option<parking_lot::Mutex<hound::WavWriter<std::io::BufWriter<std::fs::File>>>>,
    analysis: Option<parking_lot::Mutex<hound::WavWriter<std::io::BufWriter<std::fs::File>>>>,
}

fn open_wav_writer(path: &Path, sample_rate: u32) -> Option<hound::WavWriter<std::io::BufWriter<std::fs::File>>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    match hound::WavWriter::create(path, spec) {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to open WAV capture writer");
            None
        }
    }
}

/// Pushes each chunk through the optional denoiser, enqueues it on the
/// bounded PCM queue, and tees it to WAV capture. Owns no recognizer
/// knowledge — the recognizer worker is the consumer of `take_pcm_queue`.
pub struct AudioPipeline {
    config: AudioPipelineConfig,
    denoiser: parking_lot::Mutex<Option<Box<dyn NoiseReducer + Send>>>,
    pcm_tx: mpsc::Sender<Vec<u8>>,
    pcm_rx: parking_lot::Mutex<Option<mpsc::Receiver<Vec<u8>>>>,
    wav: WavTee,
    bytes: AtomicU64,
    chunks: AtomicU64,
    dropped_chunks: AtomicU64,
}

impl AudioPipeline {
    pub fn new(
        config: AudioPipelineConfig,
        denoiser: Option<Box<dyn NoiseReducer + Send>>,
    ) -> Self {
        let (pcm_tx, pcm_rx) = mpsc::channel(PCM_QUEUE_CAPACITY);

        let storage_path = config.storage_dir.join(format!("{}.wav", config.session_id));
        let storage = open_wav_writer(&storage_path, config.stt_sample_rate).map(parking_lot::Mutex::new);

        let analysis = config.analysis_dir.as_ref().and_then(|dir| {
            let analysis_path = dir.join(format!("{}.wav", config.session_id));
            if analysis_path == storage_path {
                None
            } else {
                open_wav_writer(&analysis_path, config.stt_sample_rate).map(parking_lot::Mutex::new)
            }
        });

        Self {
            config,
            denoiser: parking_lot::Mutex::new(denoiser),
            pcm_tx,
            pcm_rx: parking_lot::Mutex::new(Some(pcm_rx)),
            wav: WavTee { storage, analysis },
            bytes: AtomicU64::new(0),
            chunks: AtomicU64::new(0),
            dropped_chunks: AtomicU64::new(0),
        }
    }

    /// Takes ownership of the PCM receiver; only the recognizer worker
    /// should call this, and only once.
    pub fn take_pcm_queue(&self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.pcm_rx.lock().take()
    }

    pub fn stats(&self) -> AudioStats {
        AudioStats {
            bytes: self.bytes.load(Ordering::Relaxed),
            chunks: self.chunks.load(Ordering::Relaxed),
            dropped_chunks: self.dropped_chunks.load(Ordering::Relaxed),
        }
    }

    /// Processes one inbound decoded frame. Never panics: any denoise or
    /// write failure degrades to pass-through/drop rather than propagating.
    pub fn push_frame(&self, frame: &AudioFrame) {
        let mono = frame.to_mono();
        let resampled = mono.resample(SampleRate::from_u32(self.config.stt_sample_rate));
        let mut pcm = resampled.to_pcm16();

        pcm = self.maybe_denoise(pcm);

        self.tee_to_wav(&pcm);

        self.bytes.fetch_add(pcm.len() as u64, Ordering::Relaxed);
        match self.pcm_tx.try_send(pcm) {
            Ok(()) => {
                self.chunks.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped_chunks.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(session_id = %self.config.session_id, "PCM queue full, dropping chunk");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(session_id = %self.config.session_id, "PCM queue closed, dropping chunk");
            }
        }
    }

    /// Sends the teardown sentinel so the recognizer worker calls
    /// `CloseSend` after draining what's already queued.
    pub fn close(&self) {
        let _ = self.pcm_tx.try_send(Vec::new());
    }

    fn maybe_denoise(&self, pcm: Vec<u8>) -> Vec<u8> {
        let mut guard = self.denoiser.lock();
        if let Some(denoiser) = guard.as_mut() {
            match denoiser.process(&pcm) {
                Ok(denoised) => return denoised,
                Err(e) => {
                    tracing::warn!(session_id = %self.config.session_id, error = %e, "denoise failed, disabling for remainder of session");
                    *guard = None;
                }
            }
        }
        pcm
    }

    fn tee_to_wav(&self, pcm: &[u8]) {
        write_samples(&self.wav.storage, pcm);
        write_samples(&self.wav.analysis, pcm);
    }
}

fn write_samples(writer: &Option<parking_lot::Mutex<hound::WavWriter<std::io::BufWriter<std::fs::File>>>>, pcm: &[u8]) {
    let Some(writer) = writer else { return };
    let mut w = writer.lock();
    for chunk in pcm.chunks_exact(2) {
        let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
        if let Err(e) = w.write_sample(sample) {
            tracing::warn!(error = %e, "WAV capture write failed");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stt_gateway_core::audio::Channels;

    fn frame(samples: Vec<f32>, rate: SampleRate, channels: Channels) -> AudioFrame {
        AudioFrame::new(samples, rate, channels, 0)
    }

    #[test]
    fn push_frame_never_blocks_when_queue_is_full() {
        let dir = tempfile::tempdir().unwrap();
        let config = AudioPipelineConfig {
            session_id: "test".to_string(),
            stt_sample_rate: 16000,
            storage_dir: dir.path().to_path_buf(),
            analysis_dir: None,
        };
        let pipeline = AudioPipeline::new(config, None);
        let f = frame(vec![0.1_f32; 480], SampleRate::Hz48000, Channels::Mono);
        for _ in 0..(PCM_QUEUE_CAPACITY + 10) {
            pipeline.push_frame(&f);
        }
        let stats = pipeline.stats();
        assert!(stats.dropped_chunks > 0);
        assert_eq!(stats.chunks as usize, PCM_QUEUE_CAPACITY);
    }

    #[test]
    fn resamples_stereo_to_mono_at_target_rate() {
        let dir = tempfile::tempdir().unwrap();
        let config = AudioPipelineConfig {
            session_id: "test2".to_string(),
            stt_sample_rate: 16000,
            storage_dir: dir.path().to_path_buf(),
            analysis_dir: None,
        };
        let pipeline = AudioPipeline::new(config, None);
        let f = frame(vec![0.2_f32; 960 * 2], SampleRate::Hz48000, Channels::Stereo);
        pipeline.push_frame(&f);
        let stats = pipeline.stats();
        assert_eq!(stats.chunks, 1);
        assert!(stats.bytes > 0);
    }
}
