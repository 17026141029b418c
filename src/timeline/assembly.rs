// REELFORGE Assembly Timing Generator
// Copyright (c) 2026 Reelforge Contributors
//
// Pure derivations consumed once at export: subtitle cues (WebVTT), the
// transcript, and the cues manifest the muxing collaborator reads. Given a
// structurally valid spec these are total functions with no failure mode.
//
// Canonical timing source: the synthesized audio segment map when present.
// The even split of a scene across its chunks is only the pre-synthesis
// fallback, so subtitle timing can never silently diverge from the audio.

use super::spec::{chunk_id, Scene, VideoSpec, VisualEvent};
use serde::{Deserialize, Serialize};

/// One subtitle cue with absolute timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleCue {
    pub id: String,
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

/// Format an absolute time as `HH:MM:SS.mmm`.
pub fn format_timestamp(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as i64;
    let ms = total_ms % 1000;
    let total_seconds = total_ms / 1000;
    let sec = total_seconds % 60;
    let total_minutes = total_seconds / 60;
    let min = total_minutes % 60;
    let hour = total_minutes / 60;
    format!("{hour:02}:{min:02}:{sec:02}.{ms:03}")
}

/// Derive subtitle cues for the whole spec.
///
/// Per chunk: the synthesized segment's timing when the segment map has it,
/// otherwise that chunk's even-split slot of `[scene.start, scene.end]`.
/// Cue ids are `{scene+1}.{chunk+1}`, sequential within each scene.
pub fn subtitle_cues(spec: &VideoSpec) -> Vec<SubtitleCue> {
    let mut cues = Vec::with_capacity(spec.chunk_count());

    for (scene_idx, scene) in spec.scenes.iter().enumerate() {
        if scene.narration.is_empty() {
            continue;
        }
        let slot = (scene.end.0 - scene.start.0) / scene.narration.len() as f64;

        for (chunk_idx, text) in scene.narration.iter().enumerate() {
            let segment = spec
                .audio_segments
                .as_ref()
                .and_then(|m| m.get(&chunk_id(scene_idx, chunk_idx)));

            let (start, end) = match segment {
                Some(seg) => (seg.start.0, seg.end.0),
                None => {
                    let start = scene.start.0 + slot * chunk_idx as f64;
                    (start, start + slot)
                }
            };

            cues.push(SubtitleCue {
                id: format!("{}.{}", scene_idx + 1, chunk_idx + 1),
                start_secs: start,
                end_secs: end,
                text: text.clone(),
            });
        }
    }

    cues
}

/// Serialize cues as a WebVTT document.
pub fn to_webvtt(cues: &[SubtitleCue]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for cue in cues {
        out.push_str(&cue.id);
        out.push('\n');
        out.push_str(&format!(
            "{} --> {}\n",
            format_timestamp(cue.start_secs),
            format_timestamp(cue.end_secs)
        ));
        out.push_str(&cue.text);
        out.push_str("\n\n");
    }
    out
}

/// Plain-text transcript: one `[SCENE_KIND]` block per scene, chunks in
/// playback order, with a generation header. The timestamp is supplied by
/// the caller so the derivation itself stays pure.
pub fn transcript(spec: &VideoSpec, generated_at: &str) -> String {
    let mut out = String::new();
    out.push_str("# REELFORGE Transcript\n");
    out.push_str(&format!("# Generated: {}\n", generated_at));

    for scene in &spec.scenes {
        out.push('\n');
        out.push_str(&format!("[{}]\n", scene.kind.as_str().to_uppercase()));
        for chunk in &scene.narration {
            out.push_str(chunk);
            out.push('\n');
        }
    }
    out
}

/// One scene entry in the cues manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneCue {
    pub id: usize,
    #[serde(rename = "type")]
    pub kind: String,
    pub start: f64,
    pub end: f64,
    pub narration: Vec<String>,
    pub events: Vec<VisualEvent>,
}

/// Structured timing manifest for the muxing collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuesManifest {
    pub duration: f64,
    pub scenes: Vec<SceneCue>,
}

pub fn cues_manifest(spec: &VideoSpec) -> CuesManifest {
    CuesManifest {
        duration: spec.duration_target,
        scenes: spec
            .scenes
            .iter()
            .enumerate()
            .map(|(idx, scene)| scene_cue(idx, scene))
            .collect(),
    }
}

fn scene_cue(idx: usize, scene: &Scene) -> SceneCue {
    SceneCue {
        id: idx + 1,
        kind: scene.kind.as_str().to_string(),
        start: scene.start.0,
        end: scene.end.0,
        narration: scene.narration.clone(),
        events: scene.events.clone(),
    }
}
