// REELFORGE Voice Engine
// Copyright (c) 2026 Reelforge Contributors

use crate::timeline::narration::{SpeechSynthesizer, SynthesisCache, SynthesizedChunk};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Shells out to the neural TTS helper and probes the produced WAV for its
/// real duration, which is all the timing resolver consumes. Output files
/// are named by the synthesis content hash so the on-disk layout and the
/// in-memory cache agree about identity.
pub struct TtsEngine {
    script_path: PathBuf,
    output_dir: PathBuf,
}

impl TtsEngine {
    pub fn new(output_dir: &Path) -> Result<Self> {
        let mut script_path = PathBuf::from("tools/reelforge_tts.py");
        if !script_path.exists() {
            // Try exe-relative if CWD is wrong (e.g. running from target/debug)
            if let Ok(exe_path) = std::env::current_exe() {
                if let Some(parent) = exe_path.parent() {
                    script_path = parent.join("../../tools/reelforge_tts.py");
                }
            }
        }

        if !script_path.exists() {
            warn!(
                "[TTS] Warning: reelforge_tts.py not found at {:?}. Synthesis will fail.",
                script_path
            );
        }

        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create audio dir {:?}", output_dir))?;

        Ok(Self {
            script_path,
            output_dir: output_dir.to_path_buf(),
        })
    }

    /// Duration of a WAV file in seconds, from its header.
    pub fn wav_duration_secs(path: &Path) -> Result<f64> {
        let reader = hound::WavReader::open(path)
            .with_context(|| format!("Failed to open WAV {:?}", path))?;
        let spec = reader.spec();
        if spec.sample_rate == 0 {
            anyhow::bail!("WAV {:?} reports a zero sample rate", path);
        }
        Ok(reader.duration() as f64 / spec.sample_rate as f64)
    }
}

impl SpeechSynthesizer for TtsEngine {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        speed: f64,
    ) -> Result<SynthesizedChunk> {
        let key = SynthesisCache::key(text, voice, speed);
        let output_path = self.output_dir.join(format!("{}.wav", &key[..16]));

        if output_path.exists() {
            debug!("[TTS] Reusing rendered chunk {:?}", output_path);
        } else {
            info!("[TTS] Generating audio: \"{}\" -> {:?}", text, output_path);

            let status = Command::new("python")
                .arg(&self.script_path)
                .arg("--text")
                .arg(text)
                .arg("--output")
                .arg(&output_path)
                .arg("--voice")
                .arg(voice)
                .arg("--rate")
                .arg(format!("{:.2}", speed))
                .status()
                .await
                .context("Failed to execute TTS script")?;

            if !status.success() {
                anyhow::bail!("TTS script failed for voice '{}'", voice);
            }
        }

        let duration_secs = Self::wav_duration_secs(&output_path)?;
        Ok(SynthesizedChunk {
            path: output_path.to_string_lossy().to_string(),
            duration_secs,
        })
    }
}
