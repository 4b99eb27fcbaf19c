//! Noise reduction capability (§4.3 step 2, §9 "Subprocess denoiser").
//!
//! Modeled as an external capability rather than an in-process filter so it
//! can fail and be disabled without destabilizing the audio path: one
//! respawn attempt, then permanent disable for the remainder of the
//! session, falling back to raw PCM pass-through.

use std::io::{Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::Duration;

use stt_gateway_config::constants::timeouts::DENOISE_KILL_GRACE_MS;

use crate::PipelineError;

pub trait NoiseReducer {
    /// Processes one PCM chunk (signed 16-bit LE mono), returning the
    /// denoised chunk. An `Err` disables the reducer for the rest of the
    /// session; the caller falls back to passing the original chunk through.
    fn process(&mut self, pcm: &[u8]) -> Result<Vec<u8>, PipelineError>;
}

/// Never denoises; used when `stt.enable_denoise` is off.
pub struct NoOpNoiseReducer;

impl NoiseReducer for NoOpNoiseReducer {
    fn process(&mut self, pcm: &[u8]) -> Result<Vec<u8>, PipelineError> {
        Ok(pcm.to_vec())
    }
}

/// Spectral denoiser backed by a long-running `ffmpeg` subprocess:
/// high-pass @100 Hz, adaptive spectral subtraction (`afftdn`, noise floor
/// ≈ −25 dB), and speech normalization (target peak ≈ −6 dBFS).
pub struct FfmpegNoiseReducer {
    sample_rate: u32,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    respawned: bool,
}

impl FfmpegNoiseReducer {
    pub fn spawn(sample_rate: u32) -> Result<Self, PipelineError> {
        let mut reducer = Self { sample_rate, child: None, stdin: None, stdout: None, respawned: false };
        reducer.start()?;
        Ok(reducer)
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        let filter = "afftdn=nf=-25,highpass=f=100,speechnorm=e=6:l=1";
        let mut child = Command::new("ffmpeg")
            .args([
                "-f", "s16le",
                "-ac", "1",
                "-ar", &self.sample_rate.to_string(),
                "-i", "pipe:0",
                "-af", filter,
                "-f", "s16le",
                "pipe:1",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PipelineError::DenoiseUnavailable(format!("failed to spawn ffmpeg: {e}")))?;

        self.stdin = child.stdin.take();
        self.stdout = child.stdout.take();
        self.child = Some(child);
        Ok(())
    }

    fn restart(&mut self) -> Result<(), PipelineError> {
        self.shutdown_child();
        self.start()
    }

    fn shutdown_child(&mut self) {
        self.stdin = None;
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let deadline = std::time::Instant::now() + Duration::from_millis(DENOISE_KILL_GRACE_MS);
            loop {
                match child.try_wait() {
                    Ok(Some(_)) => break,
                    Ok(None) if std::time::Instant::now() >= deadline => {
                        let _ = child.kill();
                        break;
                    }
                    Ok(None) => std::thread::sleep(Duration::from_millis(10)),
                    Err(_) => break,
                }
            }
        }
    }
}

impl Drop for FfmpegNoiseReducer {
    fn drop(&mut self) {
        self.shutdown_child();
    }
}

impl NoiseReducer for FfmpegNoiseReducer {
    fn process(&mut self, pcm: &[u8]) -> Result<Vec<u8>, PipelineError> {
        let result = self.feed(pcm);
        match result {
            Ok(out) => Ok(out),
            Err(e) if !self.respawned => {
                tracing::warn!(error = %e, "ffmpeg denoiser pipe broke, respawning once");
                self.respawned = true;
                self.restart()?;
                self.feed(pcm)
            }
            Err(e) => Err(e),
        }
    }
}

impl FfmpegNoiseReducer {
    fn feed(&mut self, pcm: &[u8]) -> Result<Vec<u8>, PipelineError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| PipelineError::DenoiseUnavailable("ffmpeg stdin closed".to_string()))?;
        stdin
            .write_all(pcm)
            .map_err(|e| PipelineError::DenoiseUnavailable(format!("ffmpeg stdin write failed: {e}")))?;
        stdin
            .flush()
            .map_err(|e| PipelineError::DenoiseUnavailable(format!("ffmpeg stdin flush failed: {e}")))?;

        let stdout = self
            .stdout
            .as_mut()
            .ok_or_else(|| PipelineError::DenoiseUnavailable("ffmpeg stdout closed".to_string()))?;
        let mut buf = vec![0u8; pcm.len()];
        stdout
            .read_exact(&mut buf)
            .map_err(|e| PipelineError::DenoiseUnavailable(format!("ffmpeg stdout read failed: {e}")))?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_reducer_passes_through_unchanged() {
        let mut r = NoOpNoiseReducer;
        let pcm = vec![1, 2, 3, 4];
        assert_eq!(r.process(&pcm).unwrap(), pcm);
    }
}
