use crate::config::WaveformConfig;
use crate::decoder::DecodedSource;
use crate::layers::Surface;
use eframe::egui::{Color32, Pos2, Rect};

/// Visual parameters of the bar chart.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveformStyle {
    pub bar_width: f32,
    pub bar_gap: f32,
    /// Baseline position as a fraction of the height; bars extend above and below it
    /// proportionally.
    pub centerline: f32,
    /// Color of bar parts above the baseline.
    pub upper_color: Color32,
    /// Color of bar parts below the baseline.
    pub lower_color: Color32,
}

impl Default for WaveformStyle {
    fn default() -> Self {
        Self::from(&WaveformConfig::default())
    }
}

impl From<&WaveformConfig> for WaveformStyle {
    fn from(config: &WaveformConfig) -> Self {
        Self {
            bar_width: config.bar_width,
            bar_gap: config.bar_gap,
            centerline: config.centerline,
            upper_color: Color32::from_rgb(255, 255, 255),
            lower_color: Color32::from_rgb(229, 229, 229),
        }
    }
}

impl WaveformStyle {
    /// How many bars fit into `width` pixels.
    pub fn bucket_count(&self, width: f32) -> usize {
        let pitch = self.bar_width + self.bar_gap;
        if width <= 0.0 || pitch <= 0.0 {
            return 0;
        }
        (width / pitch).floor() as usize
    }
}

/// Averages absolute amplitudes over `ceil(len / buckets)` sample windows and normalizes the
/// result by the loudest window, so the tallest bar always reaches `1.0`.
///
/// A silent buffer yields all zeros.
pub fn compute_peaks(samples: &[f32], buckets: usize) -> Vec<f32> {
    if samples.is_empty() || buckets == 0 {
        return Vec::new();
    }

    let window = samples.len().div_ceil(buckets);
    let mut peaks: Vec<f32> = samples
        .chunks(window)
        .map(|chunk| chunk.iter().map(|s| s.abs()).sum::<f32>() / chunk.len() as f32)
        .collect();

    let max = peaks.iter().copied().fold(0.0f32, f32::max);
    if max > 0.0 && max.is_finite() {
        for peak in &mut peaks {
            *peak /= max;
        }
    } else {
        peaks.fill(0.0);
    }

    peaks
}

/// Peaks of one decoded source at one width.
#[derive(Debug, Default)]
pub struct PeaksCache {
    key: Option<(u64, usize)>,
    peaks: Vec<f32>,
}

impl PeaksCache {
    /// Returns the cached peaks, recomputing them when the source or bucket count changed.
    pub fn get(&mut self, source: &DecodedSource, buckets: usize) -> &[f32] {
        let key = (source.generation, buckets);
        if self.key != Some(key) {
            log::debug!(
                "[Waveform] Computing {} peaks for source generation {}",
                buckets,
                source.generation
            );
            self.peaks = compute_peaks(&source.audio.channel(0), buckets);
            self.key = Some(key);
        }
        &self.peaks
    }

    pub fn invalidate(&mut self) {
        self.key = None;
        self.peaks.clear();
    }
}

/// Draws the first channel of a decoded source as a bar chart.
#[derive(Debug, Default)]
pub struct WaveformRenderer {
    style: WaveformStyle,
    cache: PeaksCache,
}

impl WaveformRenderer {
    pub fn new(style: WaveformStyle) -> Self {
        Self {
            style,
            cache: PeaksCache::default(),
        }
    }

    /// Clears `surface` and draws the waveform of `source` over its full size.
    pub fn render(&mut self, surface: &mut impl Surface, source: &DecodedSource) {
        surface.clear();

        let size = surface.size();
        let buckets = self.style.bucket_count(size.x);
        let peaks = self.cache.get(source, buckets);
        draw_bars(surface, peaks, &self.style);
    }

    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }
}

fn draw_bars(surface: &mut impl Surface, peaks: &[f32], style: &WaveformStyle) {
    let height = surface.size().y;
    let baseline = height * style.centerline;
    let pitch = style.bar_width + style.bar_gap;

    for (i, &peak) in peaks.iter().enumerate() {
        let bar_height = peak * height;
        if bar_height <= 0.0 {
            continue;
        }

        let x = i as f32 * pitch;
        let top = (height - bar_height) * style.centerline;
        let bottom = top + bar_height;

        // One pixel gap separates the upper part from its lower reflection
        if top < baseline {
            let rect = Rect::from_min_max(
                Pos2::new(x, top),
                Pos2::new(x + style.bar_width, baseline.min(bottom)),
            );
            surface.fill_rect(rect, style.upper_color);
        }
        if bottom > baseline + 1.0 {
            let rect = Rect::from_min_max(
                Pos2::new(x, (baseline + 1.0).max(top)),
                Pos2::new(x + style.bar_width, bottom),
            );
            surface.fill_rect(rect, style.lower_color);
        }
    }
}
