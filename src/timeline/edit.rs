// REELFORGE Editing Operations
// Copyright (c) 2026 Reelforge Contributors
//
// User edits go through here: each operation works on a copy of the spec,
// re-validates, and only then hands the new spec back. A failing edit leaves
// the caller's spec untouched, so the stored project can never drift into an
// invalid state.

use super::spec::{Scene, VideoSpec, VisualEvent};
use super::validate::{validate, SpecError};
use serde::{Deserialize, Serialize};
use tracing::info;

/// One user-initiated mutation of the spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditOp {
    AddScene { scene: Scene },
    RemoveScene { index: usize },
    /// Move the scene at `from` to position `to` in the ordered list.
    ReorderScene { from: usize, to: usize },
    EditNarration {
        scene: usize,
        chunk: usize,
        text: String,
    },
    AddEvent { scene: usize, event: VisualEvent },
}

/// Error from applying an edit: either the target didn't exist, or the
/// resulting spec failed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum EditError {
    SceneIndexOutOfRange { index: usize },
    ChunkIndexOutOfRange { scene: usize, chunk: usize },
    Invalid(SpecError),
}

impl std::fmt::Display for EditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditError::SceneIndexOutOfRange { index } => {
                write!(f, "no scene at index {}", index)
            }
            EditError::ChunkIndexOutOfRange { scene, chunk } => {
                write!(f, "scene {} has no narration chunk {}", scene, chunk)
            }
            EditError::Invalid(e) => write!(f, "edit rejected: {}", e),
        }
    }
}

impl std::error::Error for EditError {}

/// Apply an edit copy-on-write. Returns the validated new spec, or an error
/// with the original spec left untouched. Edits that change narration text
/// or scene structure invalidate the derived segment map, which is dropped
/// so it gets re-resolved on the next synthesis pass.
pub fn apply_edit(spec: &VideoSpec, op: EditOp) -> Result<VideoSpec, EditError> {
    let mut next = spec.clone();
    let invalidates_audio = !matches!(op, EditOp::AddEvent { .. });

    match op {
        EditOp::AddScene { scene } => {
            next.scenes.push(scene);
        }
        EditOp::RemoveScene { index } => {
            if index >= next.scenes.len() {
                return Err(EditError::SceneIndexOutOfRange { index });
            }
            next.scenes.remove(index);
        }
        EditOp::ReorderScene { from, to } => {
            if from >= next.scenes.len() {
                return Err(EditError::SceneIndexOutOfRange { index: from });
            }
            if to >= next.scenes.len() {
                return Err(EditError::SceneIndexOutOfRange { index: to });
            }
            let scene = next.scenes.remove(from);
            next.scenes.insert(to, scene);
        }
        EditOp::EditNarration { scene, chunk, text } => {
            let target = next
                .scenes
                .get_mut(scene)
                .ok_or(EditError::SceneIndexOutOfRange { index: scene })?;
            let slot = target
                .narration
                .get_mut(chunk)
                .ok_or(EditError::ChunkIndexOutOfRange { scene, chunk })?;
            *slot = text;
        }
        EditOp::AddEvent { scene, event } => {
            let target = next
                .scenes
                .get_mut(scene)
                .ok_or(EditError::SceneIndexOutOfRange { index: scene })?;
            target.events.push(event);
        }
    }

    validate(&next).map_err(EditError::Invalid)?;

    if invalidates_audio && next.audio_segments.take().is_some() {
        info!("[EDIT] Narration or structure changed, dropping stale audio segments");
    }

    Ok(next)
}
