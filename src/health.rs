// REELFORGE Dependency Health Check
// Copyright (c) 2026 Reelforge Contributors

use std::process::Command;

/// External tools the collaborators shell out to. The kernel itself needs
/// none of them; missing entries degrade synthesis and muxing only.
const EXTERNAL_TOOLS: &[(&str, &str)] = &[
    ("python", "--version"),
    ("ffmpeg", "-version"),
];

/// Names of the external tools that are not on PATH.
pub fn check_dependencies() -> Vec<String> {
    let mut missing = Vec::new();
    for (tool, probe_arg) in EXTERNAL_TOOLS {
        let found = Command::new(tool)
            .arg(probe_arg)
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false);
        if !found {
            missing.push(tool.to_string());
        }
    }
    missing
}
