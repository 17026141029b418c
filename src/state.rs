// REELFORGE Kernel State
// Copyright (c) 2026 Reelforge Contributors

use crate::timeline::narration::SynthesisCache;
use crate::timeline::spec::{AudioSegmentMap, VideoSpec};
use crate::voice::{NarrationQueue, TtsEngine};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared state behind the dashboard server. Writers replace whole values
/// (spec, segment map), never individual fields, so concurrent readers only
/// ever observe fully computed structures.
pub struct KernelState {
    pub spec: Mutex<Option<VideoSpec>>,
    pub segments: Arc<Mutex<Option<AudioSegmentMap>>>,
    pub queue: NarrationQueue,
}

impl KernelState {
    pub fn new(tts: Arc<TtsEngine>) -> Self {
        let segments = Arc::new(Mutex::new(None));
        let cache = Arc::new(Mutex::new(SynthesisCache::new()));
        let queue = NarrationQueue::new(tts, cache, segments.clone());
        Self {
            spec: Mutex::new(None),
            segments,
            queue,
        }
    }
}

#[derive(Serialize)]
pub struct DashboardStatus {
    pub spec_loaded: bool,
    pub scene_count: usize,
    pub chunk_count: usize,
    pub segments_resolved: bool,
    pub jobs: Vec<JobSummary>,
}

#[derive(Serialize)]
pub struct JobSummary {
    pub id: String,
    pub status: String,
}
