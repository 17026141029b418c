// REELFORGE Project Persistence
// Copyright (c) 2026 Reelforge Contributors

use crate::timeline::VideoSpec;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Root data directory: `REELFORGE_DATA_DIR` when set, the platform data
/// dir otherwise.
pub fn data_dir() -> PathBuf {
    if let Ok(custom) = std::env::var("REELFORGE_DATA_DIR") {
        return PathBuf::from(custom);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reelforge")
}

/// Where rendered narration chunks land.
pub fn audio_dir() -> PathBuf {
    data_dir().join("audio")
}

/// Load a spec from its persisted JSON shape.
pub fn load_spec(path: &Path) -> Result<VideoSpec> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read spec {:?}", path))?;
    let spec: VideoSpec =
        serde_json::from_str(&content).with_context(|| format!("Malformed spec {:?}", path))?;
    Ok(spec)
}

/// Persist a spec as pretty JSON. The parent directory is created on demand.
pub fn save_spec(path: &Path, spec: &VideoSpec) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
    }
    let json = serde_json::to_string_pretty(spec).context("Failed to serialize spec")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write spec {:?}", path))?;
    info!("[PROJECT] 💾 Spec saved: {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::spec::{
        ColorPalette, Scene, SceneKind, StyleConfig, TimelineSecs,
    };

    #[test]
    fn test_save_load_round_trip() {
        let spec = VideoSpec {
            duration_target: 100.0,
            scenes: vec![Scene {
                kind: SceneKind::Intro,
                start: TimelineSecs(0.0),
                end: TimelineSecs(100.0),
                narration: vec!["hi".to_string()],
                events: vec![],
            }],
            style: StyleConfig {
                voice: "en-US-AriaNeural".to_string(),
                colors: ColorPalette {
                    primary: "#123456".to_string(),
                    accent: None,
                },
                transitions: Some(0.5),
            },
            audio_segments: None,
        };

        let dir = std::env::temp_dir().join("reelforge_test_project");
        let path = dir.join("spec.json");
        save_spec(&path, &spec).unwrap();
        let loaded = load_spec(&path).unwrap();
        assert_eq!(spec, loaded);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_spec_errors() {
        assert!(load_spec(Path::new("__reelforge_missing.json")).is_err());
    }
}
