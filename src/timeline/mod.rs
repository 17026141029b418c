// REELFORGE Timeline Kernel
// Copyright (c) 2026 Reelforge Contributors
//
// The temporal scene model and everything derived from it: structural
// validation, narration timing, sync checking, playback resolution and
// export timing. Every function in here is pure; collaborators (TTS, LLM,
// renderer, muxer) live outside this module and are reached through traits.

pub mod assembly;
pub mod edit;
pub mod narration;
pub mod playback;
pub mod spec;
pub mod sync;
pub mod validate;

pub use spec::{
    AudioSegment, AudioSegmentMap, Scene, SceneKind, SceneSecs, StyleConfig, TimelineSecs,
    VideoSpec, VisualEvent,
};
pub use validate::SpecError;
