use crate::config::WaveformConfig;
use crate::decoder::DecodedSource;
use crate::layers::{LayerStack, Surface};
use crate::playhead::PlayheadOverlay;
use crate::resize_observer::ResizeObserver;
use crate::selection::{self, CursorKind, SelectionEngine, SelectionStyle};
use crate::waveform::{WaveformRenderer, WaveformStyle};
use eframe::egui::{self, Color32, Pos2, Rect, Vec2};

const BACKGROUND: Color32 = Color32::from_rgb(24, 24, 28);

/// What the waveform area shows besides the layers.
#[derive(Clone, Copy)]
pub enum WaveformStatus<'a> {
    Empty,
    Loading,
    Failed(&'a str),
    Ready(&'a DecodedSource),
}

/// Summary of the touch events of one frame.
#[derive(Debug, Default)]
struct TouchFrame {
    /// Any touch event arrived this frame.
    any: bool,
    /// The first finger went down.
    started: bool,
    moved: bool,
    /// The last finger was lifted.
    ended: bool,
}

/// Active touch points in the order they went down.
#[derive(Debug, Default)]
struct TouchTracker {
    active: Vec<(egui::TouchId, Pos2)>,
}

impl TouchTracker {
    fn process(&mut self, events: &[egui::Event]) -> TouchFrame {
        let mut frame = TouchFrame::default();

        for event in events {
            let egui::Event::Touch { id, phase, pos, .. } = event else {
                continue;
            };
            frame.any = true;

            match phase {
                egui::TouchPhase::Start => {
                    self.active.push((*id, *pos));
                    frame.started |= self.active.len() == 1;
                }
                egui::TouchPhase::Move => {
                    let touch = self.active.iter_mut().find(|(touch_id, _)| touch_id == id);
                    if let Some((_, touch_pos)) = touch {
                        *touch_pos = *pos;
                        frame.moved = true;
                    }
                }
                egui::TouchPhase::End | egui::TouchPhase::Cancel => {
                    let before = self.active.len();
                    self.active.retain(|(touch_id, _)| touch_id != id);
                    frame.ended |= before > 0 && self.active.is_empty();
                }
            }
        }

        frame
    }

    fn first(&self) -> Option<Pos2> {
        self.active.first().map(|(_, pos)| *pos)
    }

    /// Horizontal positions of the active touches relative to `left`.
    fn xs(&self, left: f32) -> Vec<f32> {
        self.active.iter().map(|(_, pos)| pos.x - left).collect()
    }
}

pub struct WaveformWidget {
    height: f32,
    layers: LayerStack,
    resize_observer: ResizeObserver,
    renderer: WaveformRenderer,
    selection_style: SelectionStyle,
    playhead: PlayheadOverlay,
    touches: TouchTracker,
    /// Source generation currently drawn on the waveform layer.
    drawn_source: Option<u64>,
    /// Selection engine revision currently drawn on the selection layer.
    drawn_selection: Option<u64>,
}

impl WaveformWidget {
    pub fn new(config: &WaveformConfig) -> Self {
        Self {
            height: config.height,
            layers: LayerStack::default(),
            resize_observer: ResizeObserver::default(),
            renderer: WaveformRenderer::new(WaveformStyle::from(config)),
            selection_style: SelectionStyle::default(),
            playhead: PlayheadOverlay::default(),
            touches: TouchTracker::default(),
            drawn_source: None,
            drawn_selection: None,
        }
    }

    /// Forgets everything drawn for the previous source.
    pub fn reset(&mut self) {
        self.renderer.invalidate();
        self.playhead.invalidate();
        self.drawn_source = None;
        self.drawn_selection = None;
        self.touches = TouchTracker::default();
    }

    /// Shows the widget.
    ///
    /// # Parameters
    ///
    /// * `ui` - `egui::UI` for placing the widget on.
    /// * `engine` - selection engine fed with this frame's input.
    /// * `status` - decoded source to draw, or why there is none.
    /// * `current_time` - playback position for the playhead.
    /// * `duration` - duration used to place the playhead.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        engine: &mut SelectionEngine,
        status: WaveformStatus<'_>,
        current_time: Option<f64>,
        duration: f64,
    ) {
        // Size observed during the previous pass: resize every layer before any redraw
        if let Some(size) = self.resize_observer.take_change() {
            log::debug!("[Waveform] Resized to {size:?}");
            self.layers.resize(size);
            engine.set_width(size.x);
        }

        let desired = Vec2::new(ui.available_width(), self.height);
        let (rect, response) = ui.allocate_exact_size(desired, egui::Sense::click_and_drag());
        self.resize_observer.observe(rect.size());
        if self.resize_observer.has_pending() {
            ui.ctx().request_repaint();
        }

        let source = match status {
            WaveformStatus::Ready(source) => Some(source),
            _ => None,
        };
        self.handle_input(ui, &response, rect, engine, source.is_some());
        self.redraw(engine, source, current_time, duration);

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, BACKGROUND);
        self.layers.paint(&painter, rect.min);

        let message = match status {
            WaveformStatus::Empty | WaveformStatus::Ready(_) => None,
            WaveformStatus::Loading => Some(String::from("Загрузка...")),
            WaveformStatus::Failed(error) => {
                Some(format!("Не удалось загрузить аудио: {error}"))
            }
        };
        if let Some(message) = message {
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                message,
                egui::FontId::proportional(14.0),
                Color32::GRAY,
            );
        }
    }

    fn handle_input(
        &mut self,
        ui: &egui::Ui,
        response: &egui::Response,
        rect: Rect,
        engine: &mut SelectionEngine,
        enabled: bool,
    ) {
        let events = ui.input(|i| i.events.clone());
        let touch = self.touches.process(&events);

        // Touch input is also reported as pointer input by the integration, handle it once
        if touch.any || engine.suppresses_native_gestures() {
            let inside = self.touches.first().is_some_and(|pos| rect.contains(pos));
            if touch.started && enabled && inside {
                engine.touch_start(&self.touches.xs(rect.left()));
            }
            if touch.moved {
                engine.touch_move(&self.touches.xs(rect.left()));
            }
            if touch.ended {
                engine.touch_end();
            }
        } else {
            let (pressed, origin, latest, released) = ui.input(|i| {
                (
                    i.pointer.primary_pressed(),
                    i.pointer.press_origin(),
                    i.pointer.latest_pos(),
                    i.pointer.primary_released(),
                )
            });

            if pressed && enabled {
                if let Some(origin) = origin.filter(|pos| rect.contains(*pos)) {
                    engine.pointer_down(origin.x - rect.left());
                }
            }
            // While capturing, the pointer is followed anywhere on screen, not only over the widget
            if engine.is_capturing() {
                if let Some(pos) = latest {
                    engine.pointer_move(pos.x - rect.left());
                }
            }
            if released {
                engine.pointer_up();
            }
        }

        if engine.suppresses_native_gestures() {
            ui.ctx().input_mut(|i| {
                i.raw_scroll_delta = Vec2::ZERO;
                i.smooth_scroll_delta = Vec2::ZERO;
            });
        }

        let pointer = if engine.is_capturing() {
            ui.input(|i| i.pointer.latest_pos())
        } else {
            response.hover_pos()
        };
        if let Some(pos) = pointer.filter(|_| enabled) {
            let icon = match engine.cursor_at(pos.x - rect.left()) {
                CursorKind::Resize => egui::CursorIcon::ResizeHorizontal,
                CursorKind::Text => egui::CursorIcon::Text,
            };
            ui.ctx().set_cursor_icon(icon);
        }
    }

    fn redraw(
        &mut self,
        engine: &SelectionEngine,
        source: Option<&DecodedSource>,
        current_time: Option<f64>,
        duration: f64,
    ) {
        let generation = source.map(|source| source.generation);
        if self.layers.waveform.is_dirty() || self.drawn_source != generation {
            match source {
                Some(source) => self.renderer.render(&mut self.layers.waveform, source),
                None => self.layers.waveform.clear(),
            }
            self.drawn_source = generation;
            self.layers.waveform.mark_clean();
        }

        if self.layers.selection.is_dirty() || self.drawn_selection != Some(engine.revision()) {
            selection::draw_selection(
                &mut self.layers.selection,
                engine.display_range(),
                &self.selection_style,
            );
            self.drawn_selection = Some(engine.revision());
            self.layers.selection.mark_clean();
        }

        let current_time = current_time.filter(|_| source.is_some());
        let moved = self
            .playhead
            .needs_redraw(&self.layers.playhead, current_time, duration);
        if self.layers.playhead.is_dirty() || moved {
            self.playhead.render(&mut self.layers.playhead, current_time, duration);
            self.layers.playhead.mark_clean();
        }
    }
}
