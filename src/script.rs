// REELFORGE Script Bridge
// Copyright (c) 2026 Reelforge Contributors
//
// Drafts a VideoSpec from a text prompt through an OpenAI-compatible
// chat-completions endpoint (local Ollama by default). The payload is never
// trusted: it goes through the spec validator before anyone else sees it.

use crate::timeline::validate::validate;
use crate::timeline::VideoSpec;
use anyhow::{Context, Result};
use serde_json::json;
use tracing::{info, warn};

const SYSTEM_PROMPT: &str = "You are a video script planner. Reply with a single JSON object: \
{\"durationTarget\": seconds (80-180), \"scenes\": [{\"type\": string, \"start\": seconds, \
\"end\": seconds, \"narration\": [string], \"events\": [{\"t\": seconds from scene start, \
\"action\": string, \"duration\": seconds, ...params}]}], \"style\": {\"voice\": string, \
\"colors\": {\"primary\": hex}}}. Scenes must not overlap. No prose outside the JSON.";

pub struct ScriptAgent {
    client: reqwest::Client,
    api_url: String,
    model: String,
}

impl ScriptAgent {
    pub fn new(api_url: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.to_string(),
            model: model.to_string(),
        }
    }

    /// Draft a spec from a prompt and gate it through the validator.
    pub async fn draft_spec(&self, prompt: &str) -> Result<VideoSpec> {
        info!("[SCRIPT] Drafting spec with {}: {}", self.model, prompt);

        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.7
        });

        let endpoint = format!("{}/chat/completions", self.api_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&endpoint)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("LLM connection failed: {}", endpoint))?;

        if !resp.status().is_success() {
            anyhow::bail!("LLM API error: {}", resp.status());
        }

        let body: serde_json::Value = resp.json().await.context("Malformed LLM response")?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .context("LLM response missing message content")?;

        let spec: VideoSpec = serde_json::from_str(strip_code_fence(content))
            .context("LLM reply was not a valid spec payload")?;

        if let Err(e) = validate(&spec) {
            warn!("[SCRIPT] ❌ Generated spec rejected: {}", e);
            anyhow::bail!("generated spec failed validation: {}", e);
        }

        info!(
            "[SCRIPT] ✅ Spec drafted: {} scenes, {:.0}s target",
            spec.scenes.len(),
            spec.duration_target
        );
        Ok(spec)
    }
}

/// Models love wrapping JSON in markdown fences; tolerate and strip them.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
