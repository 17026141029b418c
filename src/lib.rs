// REELFORGE Narrative Kernel
// Copyright (c) 2026 Reelforge Contributors
//
// Prompt-to-video timeline kernel: the temporal scene model, its validators
// and resolvers, and the thin collaborator glue (LLM drafting, TTS, dashboard
// server) around them.

pub mod health;
pub mod project;
pub mod script;
pub mod server;
pub mod state;
pub mod timeline;
pub mod voice;
