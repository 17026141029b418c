// REELFORGE Main Entry Point
// Copyright (c) 2026 Reelforge Contributors

use reelforge_core::project;
use reelforge_core::script::ScriptAgent;
use reelforge_core::state::KernelState;
use reelforge_core::timeline::assembly::{cues_manifest, subtitle_cues, to_webvtt, transcript};
use reelforge_core::timeline::narration::{resolve_segments, SynthesisCache};
use reelforge_core::timeline::playback::{resolve_frame, ActionRegistry};
use reelforge_core::timeline::spec::TimelineSecs;
use reelforge_core::timeline::sync::check_sync;
use reelforge_core::timeline::validate::{collect_violations, validate};
use reelforge_core::voice::TtsEngine;
use reelforge_core::server;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "reelforge-core")]
#[command(about = "REELFORGE Narrative Kernel", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Draft a video spec from a prompt via the script LLM
    Generate {
        /// What the video should teach or show
        #[arg(short, long)]
        prompt: String,

        /// Where to write the drafted spec JSON
        #[arg(short, long)]
        output: PathBuf,

        /// Model to draft with
        #[arg(short, long, default_value = "llama3:latest")]
        model: String,
    },

    /// Validate a spec file against the structural invariants
    Validate {
        /// Path to the spec JSON
        #[arg(short, long)]
        spec: PathBuf,
    },

    /// Synthesize narration and resolve segment timings into the spec
    Narrate {
        /// Path to the spec JSON (updated in place with audioSegments)
        #[arg(short, long)]
        spec: PathBuf,

        /// Voice override (defaults to the spec's style voice)
        #[arg(short, long)]
        voice: Option<String>,

        /// Speech rate multiplier
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
    },

    /// Report audio/timeline sync diagnostics for a narrated spec
    Sync {
        /// Path to the spec JSON
        #[arg(short, long)]
        spec: PathBuf,
    },

    /// Resolve the render state at a playback time (debug aid)
    Probe {
        /// Path to the spec JSON
        #[arg(short, long)]
        spec: PathBuf,

        /// Absolute playback time in seconds
        #[arg(short, long)]
        time: f64,
    },

    /// Write subtitle, transcript and cues-manifest artifacts
    Export {
        /// Path to the spec JSON
        #[arg(short, long)]
        spec: PathBuf,

        /// Output directory for the artifacts
        #[arg(short, long)]
        out_dir: PathBuf,
    },

    /// Start the Dashboard Web Server
    Serve {
        /// Port to run the server on
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,hyper=error,reqwest=warn");
    }

    tracing_subscriber::fmt::init();

    // Global panic handler: log panics instead of crashing silently
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        eprintln!("🚨 [REELFORGE PANIC] at {}: {}", location, message);
    }));

    info!("--- REELFORGE NARRATIVE KERNEL v0.1.0 ---");

    let missing_deps = reelforge_core::health::check_dependencies();
    if !missing_deps.is_empty() {
        tracing::debug!(
            "⚠️ Missing external tools: {:?}. Synthesis/muxing may not work.",
            missing_deps
        );
    }

    let api_url =
        std::env::var("REELFORGE_API_URL").unwrap_or("http://localhost:11434/v1".to_string());

    let args = Cli::parse();

    match args.command {
        Commands::Generate {
            prompt,
            output,
            model,
        } => {
            let agent = ScriptAgent::new(&api_url, &model);
            let spec = agent.draft_spec(&prompt).await?;
            project::save_spec(&output, &spec)?;
            println!(
                "🎬 Drafted {} scenes targeting {:.0}s -> {:?}",
                spec.scenes.len(),
                spec.duration_target,
                output
            );
        }
        Commands::Validate { spec } => {
            let spec = project::load_spec(&spec)?;
            let violations = collect_violations(&spec);
            if violations.is_empty() {
                println!("✅ Spec is structurally valid.");
            } else {
                for v in &violations {
                    println!("❌ {}", v);
                }
                std::process::exit(1);
            }
        }
        Commands::Narrate { spec, voice, speed } => {
            let path = spec;
            let mut spec = project::load_spec(&path)?;
            validate(&spec)?;

            let voice = voice.unwrap_or_else(|| spec.style.voice.clone());
            let tts = TtsEngine::new(&project::audio_dir())?;
            let mut cache = SynthesisCache::new();

            info!("🎙️ Synthesizing {} chunks with voice {}", spec.chunk_count(), voice);
            let segments =
                resolve_segments(&spec.scenes, &voice, speed, &tts, &mut cache, None).await?;

            let report = check_sync(&segments);
            for w in &report.warnings {
                warn!("[SYNC] {}", w);
            }
            if !report.valid {
                for e in &report.errors {
                    error!("[SYNC] {}", e);
                }
            }

            spec.audio_segments = Some(segments);
            project::save_spec(&path, &spec)?;
            println!("✅ Narration resolved for {} chunks.", spec.chunk_count());
        }
        Commands::Sync { spec } => {
            let spec = project::load_spec(&spec)?;
            match &spec.audio_segments {
                Some(segments) => {
                    let report = check_sync(segments);
                    for e in &report.errors {
                        println!("❌ {}", e);
                    }
                    for w in &report.warnings {
                        println!("⚠️ {}", w);
                    }
                    if report.valid {
                        println!("✅ Segments are in sync ({} checked).", segments.len());
                    } else {
                        std::process::exit(1);
                    }
                }
                None => {
                    println!("⚠️ Spec has no audio segments yet. Run `narrate` first.");
                }
            }
        }
        Commands::Probe { spec, time } => {
            let spec = project::load_spec(&spec)?;
            let registry = ActionRegistry::builtin();
            let time = TimelineSecs(time);
            match spec.scene_at(time) {
                Some((idx, scene)) => {
                    let state = resolve_frame(scene, time, &registry);
                    println!(
                        "Scene {} ({}) at {:.2}s:",
                        idx,
                        scene.kind.as_str(),
                        time.value()
                    );
                    println!(
                        "  position [{:.2}, {:.2}, {:.2}]  opacity {:.2}  scale {:.2}  reveal {:.2}",
                        state.position[0],
                        state.position[1],
                        state.position[2],
                        state.opacity,
                        state.scale,
                        state.reveal
                    );
                }
                None => println!("No scene covers t={:.2}s", time.value()),
            }
        }
        Commands::Export { spec, out_dir } => {
            let spec = project::load_spec(&spec)?;
            validate(&spec)?;
            std::fs::create_dir_all(&out_dir)?;

            let cues = subtitle_cues(&spec);
            std::fs::write(out_dir.join("subtitles.vtt"), to_webvtt(&cues))?;

            let generated_at = chrono::Utc::now()
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string();
            std::fs::write(
                out_dir.join("transcript.txt"),
                transcript(&spec, &generated_at),
            )?;

            let manifest = cues_manifest(&spec);
            std::fs::write(
                out_dir.join("cues.json"),
                serde_json::to_string_pretty(&manifest)?,
            )?;

            println!(
                "📦 Exported {} cues, transcript and manifest to {:?}",
                cues.len(),
                out_dir
            );
        }
        Commands::Serve { port } => {
            info!("🌐 Starting REELFORGE Dashboard on port {}...", port);
            let tts = Arc::new(TtsEngine::new(&project::audio_dir())?);
            let state = Arc::new(KernelState::new(tts));
            server::start_server(port, state).await;
        }
    }

    Ok(())
}
