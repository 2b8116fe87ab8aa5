use anyhow::Context;
use audio_clip_editor::clip_editor_app::ClipEditorApp;
use audio_clip_editor::config::EditorConfig;
use audio_clip_editor::source::AudioFile;
use clap::Parser;
use eframe::egui;
use std::path::PathBuf;

/// Waveform viewer that selects, loops and cuts a part of an audio file.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Audio file to open at start.
    file: Option<PathBuf>,

    /// Settings file in TOML format.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EditorConfig::load(path)?,
        None => EditorConfig::default(),
    };

    let mut app = ClipEditorApp::new(config);
    if let Some(path) = &args.file {
        let file = AudioFile::open(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        app = app.with_file(file);
    }

    let window_options = eframe::NativeOptions {
        // Viewport is an area in which the objects are going to be rendered (i.e. native window)
        viewport: egui::ViewportBuilder::default()
            .with_min_inner_size([600.0, 340.0])
            .with_inner_size([800.0, 380.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Audio Cutter",
        window_options,
        Box::new(|_cc| Ok(Box::new(app))),
    )
    .map_err(|error| anyhow::anyhow!("failed to run the UI: {error}"))
}
