// REELFORGE Playback Time Resolver
// Copyright (c) 2026 Reelforge Contributors
//
// Pure per-frame resolution: given a scene and an absolute playback time,
// produce the render state the collaborator should draw. Called at frame
// rate and during scrubbing, so it must be deterministic, stateless and
// never propagate errors upward; malformed events degrade to clamped
// behavior with a log line instead of disrupting playback.

use super::spec::{Scene, SceneSecs, TimelineSecs, VisualEvent, DEFAULT_EVENT_DURATION_SECS};
use std::collections::HashMap;
use tracing::{trace, warn};

/// Deterministic object state for one frame. The renderer consumes this and
/// nothing else; it has no idea which events produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub position: [f64; 3],
    pub opacity: f64,
    pub scale: f64,
    /// Fraction of revealed text, 0.0 (none) to 1.0 (all).
    pub reveal: f64,
}

impl RenderState {
    /// Defined rest state: origin, fully opaque, unit scale, nothing
    /// revealed. Returned before a scene starts and when no event has run.
    pub fn rest() -> Self {
        Self {
            position: [0.0; 3],
            opacity: 1.0,
            scale: 1.0,
            reveal: 0.0,
        }
    }
}

/// Per-action extension point: given an event and a progress fraction in
/// [0, 1], mutate the render state. New action kinds plug in here without
/// touching the active-window/hold algorithm.
pub trait EventAction: Send + Sync {
    fn apply(&self, event: &VisualEvent, progress: f64, state: &mut RenderState);
}

fn lerp(a: f64, b: f64, p: f64) -> f64 {
    a + (b - a) * p
}

/// Linear position interpolation from a `from` to a `to` parameter.
struct MoveAction;

impl EventAction for MoveAction {
    fn apply(&self, event: &VisualEvent, progress: f64, state: &mut RenderState) {
        let from = event.param_vec3("from").unwrap_or(RenderState::rest().position);
        let Some(to) = event.param_vec3("to") else {
            trace!("[PLAYBACK] move event without 'to' target, skipping");
            return;
        };
        for axis in 0..3 {
            state.position[axis] = lerp(from[axis], to[axis], progress);
        }
    }
}

/// Opacity fade, defaulting to a fade-out when `to` is absent.
struct FadeAction;

impl EventAction for FadeAction {
    fn apply(&self, event: &VisualEvent, progress: f64, state: &mut RenderState) {
        let from = event.param_f64("from").unwrap_or(1.0);
        let to = event.param_f64("to").unwrap_or(0.0);
        state.opacity = lerp(from, to, progress).clamp(0.0, 1.0);
    }
}

/// Uniform scale interpolation.
struct ScaleAction;

impl EventAction for ScaleAction {
    fn apply(&self, event: &VisualEvent, progress: f64, state: &mut RenderState) {
        let from = event.param_f64("from").unwrap_or(1.0);
        let to = event.param_f64("to").unwrap_or(1.0);
        state.scale = lerp(from, to, progress);
    }
}

/// Progressive text reveal; the renderer maps the fraction onto glyphs.
struct RevealAction;

impl EventAction for RevealAction {
    fn apply(&self, _event: &VisualEvent, progress: f64, state: &mut RenderState) {
        state.reveal = progress;
    }
}

/// Name-keyed action registry. Unknown actions resolve to a no-op with a
/// trace line so a newer generator never crashes an older player.
pub struct ActionRegistry {
    actions: HashMap<String, Box<dyn EventAction>>,
}

impl ActionRegistry {
    pub fn empty() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in action kinds.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("move", Box::new(MoveAction));
        registry.register("fade", Box::new(FadeAction));
        registry.register("scale", Box::new(ScaleAction));
        registry.register("reveal", Box::new(RevealAction));
        registry
    }

    pub fn register(&mut self, name: &str, action: Box<dyn EventAction>) {
        self.actions.insert(name.to_string(), action);
    }

    fn get(&self, name: &str) -> Option<&dyn EventAction> {
        self.actions.get(name).map(|a| a.as_ref())
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Sanitized `(start, duration)` for an event's active window. Negative `t`
/// and non-positive durations are validator bugs upstream; clamp and flag
/// rather than crash.
fn active_window(event: &VisualEvent) -> (f64, f64) {
    let mut start = event.t.value();
    if start < 0.0 {
        warn!(
            "[PLAYBACK] ⚠️ event '{}' has negative t {:.2}, clamping to 0",
            event.action, start
        );
        start = 0.0;
    }
    let mut duration = event.duration_secs();
    if duration <= 0.0 {
        warn!(
            "[PLAYBACK] ⚠️ event '{}' has non-positive duration {:.2}, using default",
            event.action, duration
        );
        duration = DEFAULT_EVENT_DURATION_SECS;
    }
    (start, duration)
}

/// Resolve the render state for one frame.
///
/// Rules, per action kind (in order of first appearance in the scene):
/// - before the scene starts, everything rests;
/// - events whose window contains the scene-relative time apply at their
///   progress fraction;
/// - with no active event of a kind, the most recently elapsed one applies
///   frozen at progress 1.0 (hold-last-state), so an object stays where its
///   animation left it instead of snapping back to rest between events;
/// - a kind with no active or elapsed event contributes nothing.
pub fn resolve_frame(
    scene: &Scene,
    global_time: TimelineSecs,
    registry: &ActionRegistry,
) -> RenderState {
    let mut state = RenderState::rest();
    let rel: SceneSecs = global_time.relative_to(scene.start);
    if rel.value() <= 0.0 {
        return state;
    }
    let rel = rel.value();

    // Action kinds in order of first appearance, so output is independent of
    // registry hash order.
    let mut kinds: Vec<&str> = Vec::new();
    for event in &scene.events {
        if !kinds.contains(&event.action.as_str()) {
            kinds.push(event.action.as_str());
        }
    }

    for kind in kinds {
        let Some(action) = registry.get(kind) else {
            trace!("[PLAYBACK] no handler for action '{}', skipping", kind);
            continue;
        };

        let mut any_active = false;
        for event in scene.events.iter().filter(|e| e.action == kind) {
            let (start, duration) = active_window(event);
            if rel >= start && rel <= start + duration {
                let progress = ((rel - start) / duration).clamp(0.0, 1.0);
                action.apply(event, progress, &mut state);
                any_active = true;
            }
        }
        if any_active {
            continue;
        }

        // Hold-last-state: freeze at the final state of the most recently
        // elapsed event of this kind. Ties on window end go to the later
        // event in list order.
        let mut last_elapsed: Option<(&VisualEvent, f64)> = None;
        for event in scene.events.iter().filter(|e| e.action == kind) {
            let (start, duration) = active_window(event);
            let end = start + duration;
            if rel > end && last_elapsed.map(|(_, e)| end >= e).unwrap_or(true) {
                last_elapsed = Some((event, end));
            }
        }
        if let Some((event, _)) = last_elapsed {
            action.apply(event, 1.0, &mut state);
        }
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::spec::SceneKind;
    use serde_json::json;

    fn event(t: f64, action: &str, duration: Option<f64>, params: serde_json::Value) -> VisualEvent {
        let params = match params {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        VisualEvent {
            t: SceneSecs(t),
            action: action.to_string(),
            duration,
            params,
        }
    }

    fn scene_with(start: f64, end: f64, events: Vec<VisualEvent>) -> Scene {
        Scene {
            kind: SceneKind::Skill,
            start: TimelineSecs(start),
            end: TimelineSecs(end),
            narration: vec!["narration".to_string()],
            events,
        }
    }

    fn move_event(t: f64, duration: f64, to_x: f64) -> VisualEvent {
        event(
            t,
            "move",
            Some(duration),
            json!({"from": [0.0, 0.0, 0.0], "to": [to_x, 0.0, 0.0]}),
        )
    }

    #[test]
    fn test_before_scene_start_rests() {
        let scene = scene_with(10.0, 20.0, vec![move_event(0.0, 5.0, 10.0)]);
        let registry = ActionRegistry::builtin();
        let state = resolve_frame(&scene, TimelineSecs(9.0), &registry);
        assert_eq!(state, RenderState::rest());
        // Exactly at scene start is still rest (rel == 0)
        let state = resolve_frame(&scene, TimelineSecs(10.0), &registry);
        assert_eq!(state, RenderState::rest());
    }

    #[test]
    fn test_midpoint_progress_interpolates() {
        let scene = scene_with(10.0, 20.0, vec![move_event(0.0, 4.0, 10.0)]);
        let registry = ActionRegistry::builtin();
        let state = resolve_frame(&scene, TimelineSecs(12.0), &registry);
        assert!((state.position[0] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_hold_last_state_after_event_ends() {
        // One move over [0, 5] to x=10; query at rel=10, far past the end.
        let scene = scene_with(0.0, 20.0, vec![move_event(0.0, 5.0, 10.0)]);
        let registry = ActionRegistry::builtin();
        let state = resolve_frame(&scene, TimelineSecs(10.0), &registry);
        assert_eq!(state.position[0], 10.0); // NOT the rest position 0
    }

    #[test]
    fn test_gap_between_events_holds_previous() {
        let scene = scene_with(
            0.0,
            30.0,
            vec![move_event(0.0, 2.0, 4.0), move_event(10.0, 2.0, 8.0)],
        );
        let registry = ActionRegistry::builtin();
        // In the gap: first move finished, second not started
        let state = resolve_frame(&scene, TimelineSecs(5.0), &registry);
        assert_eq!(state.position[0], 4.0);
        // After both: the later one wins
        let state = resolve_frame(&scene, TimelineSecs(20.0), &registry);
        assert_eq!(state.position[0], 8.0);
    }

    #[test]
    fn test_hold_is_per_action_kind() {
        // Elapsed move must keep holding while a later fade is active.
        let scene = scene_with(
            0.0,
            30.0,
            vec![
                move_event(0.0, 2.0, 6.0),
                event(10.0, "fade", Some(4.0), json!({"from": 1.0, "to": 0.0})),
            ],
        );
        let registry = ActionRegistry::builtin();
        let state = resolve_frame(&scene, TimelineSecs(12.0), &registry);
        assert_eq!(state.position[0], 6.0);
        assert!((state.opacity - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_determinism_and_idempotence() {
        let scene = scene_with(
            0.0,
            30.0,
            vec![
                move_event(1.0, 3.0, 7.5),
                event(2.0, "scale", Some(2.0), json!({"from": 1.0, "to": 2.0})),
                event(0.0, "reveal", Some(10.0), json!({})),
            ],
        );
        let registry = ActionRegistry::builtin();
        // Scrub out of order; same input must give bit-identical output
        let probe = TimelineSecs(3.25);
        let first = resolve_frame(&scene, probe, &registry);
        let _elsewhere = resolve_frame(&scene, TimelineSecs(29.0), &registry);
        let second = resolve_frame(&scene, probe, &registry);
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_action_is_skipped() {
        let scene = scene_with(
            0.0,
            10.0,
            vec![event(0.0, "explode", Some(2.0), json!({"force": 9000}))],
        );
        let registry = ActionRegistry::builtin();
        let state = resolve_frame(&scene, TimelineSecs(1.0), &registry);
        assert_eq!(state, RenderState::rest());
    }

    #[test]
    fn test_malformed_event_degrades_to_clamped() {
        // Negative t and zero duration must not panic or distort output
        let scene = scene_with(
            0.0,
            10.0,
            vec![event(
                -3.0,
                "move",
                Some(0.0),
                json!({"from": [0.0, 0.0], "to": [4.0, 0.0]}),
            )],
        );
        let registry = ActionRegistry::builtin();
        // Clamped window is [0, 1]; at rel 0.5 progress is 0.5
        let state = resolve_frame(&scene, TimelineSecs(0.5), &registry);
        assert!((state.position[0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_events_rests() {
        let scene = scene_with(0.0, 10.0, vec![]);
        let registry = ActionRegistry::builtin();
        assert_eq!(
            resolve_frame(&scene, TimelineSecs(5.0), &registry),
            RenderState::rest()
        );
    }

    #[test]
    fn test_custom_action_registration() {
        struct SpinAction;
        impl EventAction for SpinAction {
            fn apply(&self, event: &VisualEvent, progress: f64, state: &mut RenderState) {
                let turns = event.param_f64("turns").unwrap_or(1.0);
                // Reuse scale as the probe channel for the test
                state.scale = turns * progress;
            }
        }

        let mut registry = ActionRegistry::builtin();
        registry.register("spin", Box::new(SpinAction));
        let scene = scene_with(
            0.0,
            10.0,
            vec![event(0.0, "spin", Some(2.0), json!({"turns": 3.0}))],
        );
        let state = resolve_frame(&scene, TimelineSecs(1.0), &registry);
        assert!((state.scale - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_progress_clamped_at_window_edges() {
        let scene = scene_with(0.0, 10.0, vec![move_event(2.0, 2.0, 10.0)]);
        let registry = ActionRegistry::builtin();
        // Exactly at start of window
        let state = resolve_frame(&scene, TimelineSecs(2.0), &registry);
        assert_eq!(state.position[0], 0.0);
        // Exactly at end of window
        let state = resolve_frame(&scene, TimelineSecs(4.0), &registry);
        assert_eq!(state.position[0], 10.0);
    }
}
