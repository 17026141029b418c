// REELFORGE Spec Validator
// Copyright (c) 2026 Reelforge Contributors
//
// Structural gate between the generator and everything downstream. A spec
// that fails here never reaches narration, playback or export.

use super::spec::{
    VideoSpec, DURATION_BUFFER_SECS, DURATION_MAX_SECS, DURATION_MIN_SECS,
};
use std::fmt;

/// A structural violation in a [`VideoSpec`]. Deterministic and recoverable
/// by a user edit; each variant pins the scene(s) involved.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecError {
    DurationOutOfRange { got: f64 },
    NoScenes,
    InvalidSceneBounds { scene: usize },
    SceneOverlap { first: usize, second: usize },
    DurationMismatch { last_end: f64, target: f64 },
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecError::DurationOutOfRange { got } => write!(
                f,
                "duration target {:.1}s outside allowed range [{:.0}, {:.0}]",
                got, DURATION_MIN_SECS, DURATION_MAX_SECS
            ),
            SpecError::NoScenes => write!(f, "spec contains no scenes"),
            SpecError::InvalidSceneBounds { scene } => {
                write!(f, "scene {} has end <= start", scene)
            }
            SpecError::SceneOverlap { first, second } => {
                write!(f, "scene {} overlaps scene {}", first, second)
            }
            SpecError::DurationMismatch { last_end, target } => write!(
                f,
                "last scene ends at {:.1}s, beyond target {:.1}s (+{:.0}s buffer)",
                last_end, target, DURATION_BUFFER_SECS
            ),
        }
    }
}

impl std::error::Error for SpecError {}

/// Collect every violation, in rule precedence order. Used by interactive
/// editing where the user wants the full picture at once.
pub fn collect_violations(spec: &VideoSpec) -> Vec<SpecError> {
    let mut errors = Vec::new();

    if spec.duration_target < DURATION_MIN_SECS || spec.duration_target > DURATION_MAX_SECS {
        errors.push(SpecError::DurationOutOfRange {
            got: spec.duration_target,
        });
    }

    if spec.scenes.is_empty() {
        errors.push(SpecError::NoScenes);
        return errors;
    }

    for (i, scene) in spec.scenes.iter().enumerate() {
        if scene.end.0 <= scene.start.0 {
            errors.push(SpecError::InvalidSceneBounds { scene: i });
        }
    }

    // Overlap is defined over the start-sorted view; reported indices are the
    // original scene positions.
    let mut order: Vec<usize> = (0..spec.scenes.len()).collect();
    order.sort_by(|&a, &b| {
        spec.scenes[a]
            .start
            .partial_cmp(&spec.scenes[b].start)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for pair in order.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if spec.scenes[a].end.0 > spec.scenes[b].start.0 {
            errors.push(SpecError::SceneOverlap {
                first: a,
                second: b,
            });
        }
    }

    let last = order[order.len() - 1];
    if spec.scenes[last].end.0 > spec.duration_target + DURATION_BUFFER_SECS {
        errors.push(SpecError::DurationMismatch {
            last_end: spec.scenes[last].end.0,
            target: spec.duration_target,
        });
    }

    errors
}

/// Fail-fast gate for the pipeline: first violation in precedence order.
pub fn validate(spec: &VideoSpec) -> Result<(), SpecError> {
    match collect_violations(spec).into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
