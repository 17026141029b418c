// REELFORGE Narration Queue
// Copyright (c) 2026 Reelforge Contributors

use crate::timeline::narration::{
    resolve_segments, CancelFlag, SpeechSynthesizer, SynthesisCache,
};
use crate::timeline::spec::{AudioSegmentMap, Scene};
use crate::timeline::sync::check_sync;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum JobStatus {
    Queued,
    Processing,
    Completed {
        duration_secs: f64,
        segment_count: usize,
        sync_warnings: Vec<String>,
    },
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct NarrationJob {
    pub id: Uuid,
    pub scenes: Vec<Scene>,
    pub voice: String,
    pub speed: f64,
    pub status: JobStatus,
    pub created_at: Instant,
    pub cancel: CancelFlag,
}

/// Background narration synthesis. One worker drains the queue; a completed
/// job swaps its fully computed segment map into the shared slot as a whole,
/// so readers never observe a half-timed map.
pub struct NarrationQueue {
    jobs: Arc<Mutex<Vec<NarrationJob>>>,
    tx: mpsc::UnboundedSender<Uuid>,
}

impl NarrationQueue {
    pub fn new<S>(
        tts: Arc<S>,
        cache: Arc<Mutex<SynthesisCache>>,
        segments_slot: Arc<Mutex<Option<AudioSegmentMap>>>,
    ) -> Self
    where
        S: SpeechSynthesizer + Send + Sync + 'static,
    {
        let jobs = Arc::new(Mutex::new(Vec::<NarrationJob>::new()));
        let (tx, mut rx) = mpsc::unbounded_channel::<Uuid>();

        let jobs_worker = jobs.clone();

        tokio::spawn(async move {
            info!("[QUEUE] Narration worker started.");
            while let Some(job_id) = rx.recv().await {
                let job_opt = {
                    let mut jobs = jobs_worker.lock().await;
                    if let Some(job) = jobs.iter_mut().find(|j| j.id == job_id) {
                        job.status = JobStatus::Processing;
                        Some(job.clone())
                    } else {
                        None
                    }
                };

                let Some(job) = job_opt else { continue };
                info!(
                    "[QUEUE] Processing job {} ({} scenes, voice {})",
                    job_id,
                    job.scenes.len(),
                    job.voice
                );

                let result = {
                    let mut cache = cache.lock().await;
                    resolve_segments(
                        &job.scenes,
                        &job.voice,
                        job.speed,
                        tts.as_ref(),
                        &mut cache,
                        Some(&job.cancel),
                    )
                    .await
                };

                let mut jobs = jobs_worker.lock().await;
                let Some(final_job) = jobs.iter_mut().find(|j| j.id == job_id) else {
                    continue;
                };
                match result {
                    Ok(segments) => {
                        let report = check_sync(&segments);
                        let duration = job.created_at.elapsed().as_secs_f64();
                        info!(
                            "[QUEUE] ✅ Job {} completed: {} segments in {:.1}s",
                            job_id,
                            segments.len(),
                            duration
                        );
                        final_job.status = JobStatus::Completed {
                            duration_secs: duration,
                            segment_count: segments.len(),
                            sync_warnings: report.warnings,
                        };
                        // Whole-map swap; readers never see a partial update
                        *segments_slot.lock().await = Some(segments);
                    }
                    Err(e) => {
                        error!("[QUEUE] Job {} failed: {}", job_id, e);
                        final_job.status = JobStatus::Failed(e.to_string());
                    }
                }
            }
        });

        Self { jobs, tx }
    }

    pub async fn enqueue(&self, scenes: Vec<Scene>, voice: String, speed: f64) -> Uuid {
        let job = NarrationJob {
            id: Uuid::new_v4(),
            scenes,
            voice,
            speed,
            status: JobStatus::Queued,
            created_at: Instant::now(),
            cancel: CancelFlag::new(),
        };
        let id = job.id;
        {
            let mut jobs = self.jobs.lock().await;
            jobs.push(job);
        }
        let _ = self.tx.send(id);
        info!("[QUEUE] Added narration job {}", id);
        id
    }

    pub async fn status(&self, id: Uuid) -> Option<JobStatus> {
        let jobs = self.jobs.lock().await;
        jobs.iter().find(|j| j.id == id).map(|j| j.status.clone())
    }

    /// Request cancellation; takes effect before the job's next chunk.
    pub async fn cancel(&self, id: Uuid) -> bool {
        let jobs = self.jobs.lock().await;
        match jobs.iter().find(|j| j.id == id) {
            Some(job) => {
                job.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn list(&self) -> Vec<(Uuid, JobStatus)> {
        let jobs = self.jobs.lock().await;
        jobs.iter().map(|j| (j.id, j.status.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::narration::SynthesizedChunk;
    use crate::timeline::spec::{SceneKind, TimelineSecs};
    use std::time::Duration;

    struct InstantSynth;

    impl SpeechSynthesizer for InstantSynth {
        async fn synthesize(
            &self,
            text: &str,
            _voice: &str,
            _speed: f64,
        ) -> anyhow::Result<SynthesizedChunk> {
            Ok(SynthesizedChunk {
                path: format!("/tmp/{}.wav", text.len()),
                duration_secs: 1.0,
            })
        }
    }

    fn scenes() -> Vec<Scene> {
        vec![Scene {
            kind: SceneKind::Intro,
            start: TimelineSecs(0.0),
            end: TimelineSecs(10.0),
            narration: vec!["hello".to_string(), "world".to_string()],
            events: vec![],
        }]
    }

    async fn wait_for_terminal(queue: &NarrationQueue, id: Uuid) -> JobStatus {
        for _ in 0..100 {
            match queue.status(id).await {
                Some(JobStatus::Queued) | Some(JobStatus::Processing) => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Some(terminal) => return terminal,
                None => panic!("job disappeared"),
            }
        }
        panic!("job never finished");
    }

    #[tokio::test]
    async fn test_job_completes_and_swaps_segments_in() {
        let slot = Arc::new(Mutex::new(None));
        let cache = Arc::new(Mutex::new(SynthesisCache::new()));
        let queue = NarrationQueue::new(Arc::new(InstantSynth), cache, slot.clone());

        let id = queue.enqueue(scenes(), "aria".to_string(), 1.0).await;
        let status = wait_for_terminal(&queue, id).await;

        match status {
            JobStatus::Completed {
                segment_count,
                sync_warnings,
                ..
            } => {
                assert_eq!(segment_count, 2);
                assert!(sync_warnings.is_empty());
            }
            other => panic!("expected completion, got {:?}", other),
        }

        // The fully computed map was swapped into the shared slot
        let segments = slot.lock().await;
        let segments = segments.as_ref().expect("segments swapped in");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments["scene0_chunk1"].start, TimelineSecs(2.5));
    }

    #[tokio::test]
    async fn test_unknown_job_has_no_status() {
        let slot = Arc::new(Mutex::new(None));
        let cache = Arc::new(Mutex::new(SynthesisCache::new()));
        let queue = NarrationQueue::new(Arc::new(InstantSynth), cache, slot);
        assert_eq!(queue.status(Uuid::new_v4()).await, None);
        assert!(!queue.cancel(Uuid::new_v4()).await);
    }
}

