// REELFORGE Temporal Scene Model
// Copyright (c) 2026 Reelforge Contributors
//
// The VideoSpec is the single source of truth for a video: target duration,
// ordered non-overlapping scenes, narration chunks and scene-relative visual
// events. The audio segment map is derived from it after synthesis and keyed
// by chunk id so it can be regenerated (e.g. on a voice change) without
// touching scene data.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Allowed range for the target duration, in seconds.
pub const DURATION_MIN_SECS: f64 = 80.0;
pub const DURATION_MAX_SECS: f64 = 180.0;

/// Tolerance between the last scene's end and the duration target.
pub const DURATION_BUFFER_SECS: f64 = 5.0;

/// Active window length for events that don't declare their own.
pub const DEFAULT_EVENT_DURATION_SECS: f64 = 1.0;

/// Fallback scene transition length when the style omits one.
pub const DEFAULT_TRANSITION_SECS: f64 = 0.3;

/// A position on the absolute video timeline, in seconds.
///
/// Kept distinct from [`SceneSecs`] so an event's scene-relative offset can
/// never be compared against a global playback time by accident.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimelineSecs(pub f64);

/// An offset measured from the owning scene's start, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneSecs(pub f64);

impl TimelineSecs {
    pub fn value(self) -> f64 {
        self.0
    }

    /// Re-anchor this absolute time against a scene's start.
    pub fn relative_to(self, scene_start: TimelineSecs) -> SceneSecs {
        SceneSecs(self.0 - scene_start.0)
    }
}

impl SceneSecs {
    pub fn value(self) -> f64 {
        self.0
    }
}

/// Scene category. The set is open: anything the generator emits beyond the
/// built-in kinds round-trips through `Custom` untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SceneKind {
    Intro,
    Skill,
    Summary,
    Custom(String),
}

impl SceneKind {
    pub fn as_str(&self) -> &str {
        match self {
            SceneKind::Intro => "intro",
            SceneKind::Skill => "skill",
            SceneKind::Summary => "summary",
            SceneKind::Custom(s) => s.as_str(),
        }
    }
}

impl From<String> for SceneKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "intro" => SceneKind::Intro,
            "skill" => SceneKind::Skill,
            "summary" => SceneKind::Summary,
            _ => SceneKind::Custom(s),
        }
    }
}

impl From<SceneKind> for String {
    fn from(kind: SceneKind) -> Self {
        kind.as_str().to_string()
    }
}

/// A timestamped instruction to the renderer. `t` is relative to the scene's
/// own start, never to the global timeline. Action-specific parameters
/// (positions, colors, paths) are carried opaquely in `params`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualEvent {
    pub t: SceneSecs,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl VisualEvent {
    pub fn duration_secs(&self) -> f64 {
        self.duration.unwrap_or(DEFAULT_EVENT_DURATION_SECS)
    }

    /// Fetch a numeric action parameter.
    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(|v| v.as_f64())
    }

    /// Fetch a `[x, y, z]` action parameter. Two-element arrays are padded
    /// with z = 0 since flat scenes omit depth.
    pub fn param_vec3(&self, key: &str) -> Option<[f64; 3]> {
        let arr = self.params.get(key)?.as_array()?;
        if arr.len() < 2 || arr.len() > 3 {
            return None;
        }
        let mut out = [0.0; 3];
        for (i, v) in arr.iter().enumerate() {
            out[i] = v.as_f64()?;
        }
        Some(out)
    }
}

/// One contiguous time window of the video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(rename = "type")]
    pub kind: SceneKind,
    pub start: TimelineSecs,
    pub end: TimelineSecs,
    /// Narration chunks, rendered in order. Order is playback order.
    pub narration: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<VisualEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorPalette {
    pub primary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
}

/// Rendering parameters. Not time-bearing; carried because the renderer and
/// TTS collaborators are parameterized by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleConfig {
    pub voice: String,
    pub colors: ColorPalette,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitions: Option<f64>,
}

impl StyleConfig {
    pub fn transition_secs(&self) -> f64 {
        self.transitions.unwrap_or(DEFAULT_TRANSITION_SECS)
    }
}

/// One synthesized narration chunk placed on the absolute timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSegment {
    pub path: String,
    pub start: TimelineSecs,
    pub end: TimelineSecs,
}

/// Derived map from chunk id (`scene{N}_chunk{M}`) to its placed segment.
/// BTreeMap keeps serialization order deterministic.
pub type AudioSegmentMap = BTreeMap<String, AudioSegment>;

/// Key for a narration chunk inside the segment map.
pub fn chunk_id(scene_idx: usize, chunk_idx: usize) -> String {
    format!("scene{}_chunk{}", scene_idx, chunk_idx)
}

/// Root entity describing a whole video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSpec {
    pub duration_target: f64,
    pub scenes: Vec<Scene>,
    pub style: StyleConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_segments: Option<AudioSegmentMap>,
}

impl VideoSpec {
    /// Total narration chunk count across all scenes.
    pub fn chunk_count(&self) -> usize {
        self.scenes.iter().map(|s| s.narration.len()).sum()
    }

    /// Scene containing the given absolute time, if any. When boundaries
    /// touch, the later scene wins so `t = scene.end` resolves forward.
    pub fn scene_at(&self, time: TimelineSecs) -> Option<(usize, &Scene)> {
        self.scenes
            .iter()
            .enumerate()
            .filter(|(_, s)| time.0 >= s.start.0 && time.0 < s.end.0)
            .last()
            .or_else(|| {
                // time == last end still belongs to the last scene
                self.scenes
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| (time.0 - s.end.0).abs() < f64::EPSILON)
                    .last()
            })
    }
}
