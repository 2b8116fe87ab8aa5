use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Editor settings. Every field is optional in the file:
///
/// ```toml
/// [waveform]
/// centerline = 0.7
///
/// [selection]
/// resize_edge_width = 12.0
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditorConfig {
    pub waveform: WaveformConfig,
    pub selection: SelectionConfig,
    pub transport: TransportConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct WaveformConfig {
    /// Width of a single bar in pixels.
    pub bar_width: f32,
    /// Gap between bars in pixels.
    pub bar_gap: f32,
    /// Vertical position of the bar baseline as a fraction of the height, `0.5` centers the
    /// bars, `0.7` gives the classic "reflection" look.
    pub centerline: f32,
    /// Height of the waveform widget in pixels.
    pub height: f32,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            bar_width: 2.0,
            bar_gap: 1.0,
            centerline: 0.5,
            height: 160.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SelectionConfig {
    /// Drafts narrower than this many pixels are treated as clicks.
    pub min_range_width: f64,
    /// Distance in pixels from a range edge within which a press resizes the range.
    pub resize_edge_width: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_range_width: 1.0,
            resize_edge_width: 10.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    pub initial_volume: f32,
    /// How often the playback thread publishes its position while playing.
    pub sample_interval_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            initial_volume: 1.0,
            sample_interval_ms: 16,
        }
    }
}

impl TransportConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(1))
    }
}

impl EditorConfig {
    /// Loads settings from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            log::info!("Config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        let config =
            Self::parse(&text).with_context(|| format!("parse config: {}", path.display()))?;
        Ok(config.sanitized())
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Clamps values into ranges the renderers and the engine can work with.
    fn sanitized(mut self) -> Self {
        self.waveform.bar_width = self.waveform.bar_width.max(1.0);
        self.waveform.bar_gap = self.waveform.bar_gap.max(0.0);
        self.waveform.centerline = self.waveform.centerline.clamp(0.0, 1.0);
        self.waveform.height = self.waveform.height.max(16.0);
        self.selection.min_range_width = self.selection.min_range_width.max(0.0);
        self.selection.resize_edge_width = self.selection.resize_edge_width.max(0.0);
        self.transport.initial_volume = self.transport.initial_volume.clamp(0.0, 1.0);
        self
    }
}
