// REELFORGE Narration Timing Resolver
// Copyright (c) 2026 Reelforge Contributors
//
// Places every narration chunk on the absolute timeline from the durations
// the speech collaborator reports. Segments are NOT clipped to scene
// boundaries; total narration length may drift from scene-boxed durations,
// which the sync validator watches for.

use super::spec::{chunk_id, AudioSegment, AudioSegmentMap, Scene, TimelineSecs};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Fixed silence inserted between consecutive narration segments.
pub const PAUSE_PADDING_SECS: f64 = 1.5;

/// What the speech collaborator hands back for one chunk. The core only
/// consumes `duration_secs`; the path is opaque passthrough.
#[derive(Debug, Clone)]
pub struct SynthesizedChunk {
    pub path: String,
    pub duration_secs: f64,
}

/// Collaborator seam for speech synthesis. Implementations own retries and
/// timeouts; the resolver only sequences calls and places results.
pub trait SpeechSynthesizer {
    fn synthesize(
        &self,
        text: &str,
        voice: &str,
        speed: f64,
    ) -> impl std::future::Future<Output = anyhow::Result<SynthesizedChunk>> + Send;
}

/// Chunk-granular cancellation handle. Aborting never rolls back chunks that
/// already synthesized; their cache entries stay valid.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Rendered-chunk cache keyed by a content hash of (text, voice, speed).
/// A voice or text change misses naturally; unchanged chunks are never
/// re-synthesized.
#[derive(Debug, Default)]
pub struct SynthesisCache {
    entries: HashMap<String, SynthesizedChunk>,
}

impl SynthesisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stable cache key for one chunk's synthesis inputs.
    pub fn key(text: &str, voice: &str, speed: f64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(b"|");
        hasher.update(voice.as_bytes());
        hasher.update(b"|");
        hasher.update(speed.to_bits().to_le_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn get(&self, key: &str) -> Option<&SynthesizedChunk> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, chunk: SynthesizedChunk) {
        self.entries.insert(key, chunk);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NarrationError {
    /// One chunk failed; the whole resolution is discarded so downstream
    /// never sees a half-timed map.
    SynthesisFailed { chunk_id: String, cause: String },
    /// Cancelled between chunks; `completed` chunks had already synthesized.
    Cancelled { completed: usize },
}

impl fmt::Display for NarrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NarrationError::SynthesisFailed { chunk_id, cause } => {
                write!(f, "synthesis failed for {}: {}", chunk_id, cause)
            }
            NarrationError::Cancelled { completed } => {
                write!(f, "narration cancelled after {} chunks", completed)
            }
        }
    }
}

impl std::error::Error for NarrationError {}

/// Resolve absolute segment timings for every narration chunk.
///
/// Chunks are flattened in scene order then chunk order and synthesized
/// sequentially, each awaited before the next. The cursor starts at zero and
/// advances by the reported duration plus [`PAUSE_PADDING_SECS`].
pub async fn resolve_segments<S: SpeechSynthesizer>(
    scenes: &[Scene],
    voice: &str,
    speed: f64,
    synth: &S,
    cache: &mut SynthesisCache,
    cancel: Option<&CancelFlag>,
) -> Result<AudioSegmentMap, NarrationError> {
    let mut segments = AudioSegmentMap::new();
    let mut cursor = 0.0_f64;
    let mut completed = 0usize;

    for (scene_idx, scene) in scenes.iter().enumerate() {
        for (chunk_idx, text) in scene.narration.iter().enumerate() {
            if cancel.map(|c| c.is_cancelled()).unwrap_or(false) {
                info!("[NARRATION] Cancelled before chunk {}/{}", scene_idx, chunk_idx);
                return Err(NarrationError::Cancelled { completed });
            }

            let id = chunk_id(scene_idx, chunk_idx);
            let key = SynthesisCache::key(text, voice, speed);

            let chunk = match cache.get(&key) {
                Some(hit) => {
                    debug!("[NARRATION] Cache hit for {}", id);
                    hit.clone()
                }
                None => {
                    let fresh = synth
                        .synthesize(text, voice, speed)
                        .await
                        .map_err(|e| NarrationError::SynthesisFailed {
                            chunk_id: id.clone(),
                            cause: e.to_string(),
                        })?;
                    cache.insert(key, fresh.clone());
                    fresh
                }
            };

            segments.insert(
                id,
                AudioSegment {
                    path: chunk.path.clone(),
                    start: TimelineSecs(cursor),
                    end: TimelineSecs(cursor + chunk.duration_secs),
                },
            );
            cursor += chunk.duration_secs + PAUSE_PADDING_SECS;
            completed += 1;
        }
    }

    info!(
        "[NARRATION] ✅ Resolved {} segments, narration ends at {:.2}s",
        segments.len(),
        (cursor - PAUSE_PADDING_SECS).max(0.0)
    );
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::spec::SceneKind;
    use std::sync::Mutex;

    /// Scripted synthesizer: fixed duration per text, counts real calls.
    struct FakeSynth {
        durations: HashMap<String, f64>,
        calls: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl FakeSynth {
        fn new(pairs: &[(&str, f64)]) -> Self {
            Self {
                durations: pairs
                    .iter()
                    .map(|(t, d)| (t.to_string(), *d))
                    .collect(),
                calls: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl SpeechSynthesizer for FakeSynth {
        async fn synthesize(
            &self,
            text: &str,
            _voice: &str,
            _speed: f64,
        ) -> anyhow::Result<SynthesizedChunk> {
            self.calls.lock().unwrap().push(text.to_string());
            if self.fail_on.as_deref() == Some(text) {
                anyhow::bail!("tts backend unreachable");
            }
            let duration = *self
                .durations
                .get(text)
                .ok_or_else(|| anyhow::anyhow!("no scripted duration for '{}'", text))?;
            Ok(SynthesizedChunk {
                path: format!("/tmp/{}.wav", text.len()),
                duration_secs: duration,
            })
        }
    }

    fn scene(start: f64, end: f64, narration: &[&str]) -> Scene {
        Scene {
            kind: SceneKind::Intro,
            start: TimelineSecs(start),
            end: TimelineSecs(end),
            narration: narration.iter().map(|s| s.to_string()).collect(),
            events: vec![],
        }
    }

    #[tokio::test]
    async fn test_reference_two_chunk_scenario() {
        let scenes = vec![
            scene(0.0, 5.0, &["Welcome", "Let us begin"]),
            scene(5.0, 10.0, &[]),
        ];
        let synth = FakeSynth::new(&[("Welcome", 2.0), ("Let us begin", 1.5)]);
        let mut cache = SynthesisCache::new();

        let segments = resolve_segments(&scenes, "aria", 1.0, &synth, &mut cache, None)
            .await
            .unwrap();

        assert_eq!(segments.len(), 2);
        let first = &segments["scene0_chunk0"];
        assert_eq!(first.start, TimelineSecs(0.0));
        assert_eq!(first.end, TimelineSecs(2.0));
        let second = &segments["scene0_chunk1"];
        assert_eq!(second.start, TimelineSecs(3.5));
        assert_eq!(second.end, TimelineSecs(5.0));
    }

    #[tokio::test]
    async fn test_timing_monotonicity_across_scenes() {
        let scenes = vec![
            scene(0.0, 10.0, &["a", "b"]),
            scene(10.0, 20.0, &["c"]),
        ];
        let synth = FakeSynth::new(&[("a", 1.0), ("b", 2.5), ("c", 0.8)]);
        let mut cache = SynthesisCache::new();
        let segments = resolve_segments(&scenes, "aria", 1.0, &synth, &mut cache, None)
            .await
            .unwrap();

        let mut ordered: Vec<&AudioSegment> = segments.values().collect();
        ordered.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap());
        for pair in ordered.windows(2) {
            assert!(pair[1].start.0 > pair[0].start.0);
            assert!((pair[0].end.0 + PAUSE_PADDING_SECS - pair[1].start.0).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn test_failure_discards_partial_result() {
        let scenes = vec![scene(0.0, 10.0, &["ok", "boom", "never"])];
        let mut synth = FakeSynth::new(&[("ok", 1.0), ("never", 1.0)]);
        synth.fail_on = Some("boom".to_string());
        let mut cache = SynthesisCache::new();

        let err = resolve_segments(&scenes, "aria", 1.0, &synth, &mut cache, None)
            .await
            .unwrap_err();
        match err {
            NarrationError::SynthesisFailed { chunk_id, .. } => {
                assert_eq!(chunk_id, "scene0_chunk1");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // Third chunk was never attempted
        assert_eq!(synth.call_count(), 2);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_synthesis() {
        let scenes = vec![scene(0.0, 10.0, &["same", "same"])];
        let synth = FakeSynth::new(&[("same", 2.0)]);
        let mut cache = SynthesisCache::new();

        let segments = resolve_segments(&scenes, "aria", 1.0, &synth, &mut cache, None)
            .await
            .unwrap();
        assert_eq!(segments.len(), 2);
        // Identical text under the same voice synthesizes once
        assert_eq!(synth.call_count(), 1);

        // Re-resolving is free
        let again = resolve_segments(&scenes, "aria", 1.0, &synth, &mut cache, None)
            .await
            .unwrap();
        assert_eq!(synth.call_count(), 1);
        assert_eq!(segments, again);
    }

    #[tokio::test]
    async fn test_voice_change_misses_cache() {
        let scenes = vec![scene(0.0, 10.0, &["hello"])];
        let synth = FakeSynth::new(&[("hello", 2.0)]);
        let mut cache = SynthesisCache::new();

        resolve_segments(&scenes, "aria", 1.0, &synth, &mut cache, None)
            .await
            .unwrap();
        resolve_segments(&scenes, "guy", 1.0, &synth, &mut cache, None)
            .await
            .unwrap();
        assert_eq!(synth.call_count(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_before_next_chunk() {
        let scenes = vec![scene(0.0, 10.0, &["one", "two"])];
        let synth = FakeSynth::new(&[("one", 1.0), ("two", 1.0)]);
        let mut cache = SynthesisCache::new();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = resolve_segments(&scenes, "aria", 1.0, &synth, &mut cache, Some(&cancel))
            .await
            .unwrap_err();
        assert_eq!(err, NarrationError::Cancelled { completed: 0 });
        assert_eq!(synth.call_count(), 0);
    }

    #[test]
    fn test_cache_key_is_input_sensitive() {
        let base = SynthesisCache::key("hello", "aria", 1.0);
        assert_ne!(base, SynthesisCache::key("hello!", "aria", 1.0));
        assert_ne!(base, SynthesisCache::key("hello", "guy", 1.0));
        assert_ne!(base, SynthesisCache::key("hello", "aria", 1.25));
        assert_eq!(base, SynthesisCache::key("hello", "aria", 1.0));
    }
}
