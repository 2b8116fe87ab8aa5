use crate::config::SelectionConfig;
use crate::error::GestureInputError;
use crate::layers::Surface;
use crate::time_range::{self, OffsetRange, TimeRange};
use eframe::egui::{Color32, Pos2, Rect};
use std::sync::mpsc::Sender;

/// Outbound notifications of the engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SelectionEvent {
    /// The committed selection changed, in seconds. [None] when it was cleared.
    RangeChanged(Option<TimeRange>),
    /// A click without drag asked to move playback to this time in seconds.
    Seek(f64),
}

/// Which boundary of the draft range follows the pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeEdge {
    Start,
    End,
}

impl ResizeEdge {
    fn flipped(self) -> Self {
        match self {
            ResizeEdge::Start => ResizeEdge::End,
            ResizeEdge::End => ResizeEdge::Start,
        }
    }
}

/// Cursor the widget should show for the current pointer position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorKind {
    /// Over a range edge, or resizing one.
    Resize,
    /// Anywhere else, or drafting a new range.
    Text,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GestureKind {
    /// Started on an edge of the committed range.
    Resize,
    /// Started anywhere else; the committed range was dropped.
    Create,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InputSource {
    Pointer,
    Touch,
}

#[derive(Clone, Copy, Debug)]
struct Gesture {
    kind: GestureKind,
    source: InputSource,
    edge: ResizeEdge,
    draft: OffsetRange,
    /// Set once the draft first reaches the minimum width; from then on the draft is shown
    /// even if it shrinks below it again.
    ignore_min_width: bool,
}

/// Turns pointer and touch sequences into create, resize and clear operations on a single
/// selection.
///
/// Positions are pixels relative to the waveform's left edge. They are stored as offsets in
/// `[0, 1]` of the width, while edge hit testing stays in pixels. Outcomes are reported as
/// [SelectionEvent]s over a channel.
pub struct SelectionEngine {
    config: SelectionConfig,
    events: Sender<SelectionEvent>,
    committed: Option<OffsetRange>,
    gesture: Option<Gesture>,
    /// Plotted waveform width in pixels.
    width: f64,
    /// Duration of the decoded audio, [None] until a buffer is decoded.
    duration: Option<f64>,
    /// Bumped on every change that affects what the selection layer shows.
    revision: u64,
}

impl SelectionEngine {
    /// Creates an idle engine.
    ///
    /// # Parameters
    ///
    /// * `config` - minimum range width and edge grab tolerance.
    /// * `events` - channel receiving range changes and seek requests.
    pub fn new(config: SelectionConfig, events: Sender<SelectionEvent>) -> Self {
        Self {
            config,
            events,
            committed: None,
            gesture: None,
            width: 0.0,
            duration: None,
            revision: 0,
        }
    }

    pub fn set_width(&mut self, width: f32) {
        let width = f64::from(width.max(0.0));
        if width != self.width {
            self.width = width;
            self.touch();
        }
    }

    /// Sets the duration of the decoded audio; [None] while nothing is decoded.
    pub fn set_duration(&mut self, duration: Option<f64>) {
        self.duration = duration.filter(|d| d.is_finite() && *d > 0.0);
        self.touch();
    }

    /// Drops the committed selection and any gesture in flight, e.g. when the source changes.
    pub fn reset(&mut self) {
        if self.gesture.is_some() {
            log::debug!("[Selection] Gesture aborted by reset");
        }
        self.committed = None;
        self.gesture = None;
        self.touch();
    }

    pub fn pointer_down(&mut self, x: f32) {
        self.begin(x, InputSource::Pointer);
    }

    pub fn pointer_move(&mut self, x: f32) {
        let Some(gesture) = self.gesture.as_mut() else {
            return;
        };

        let offset = time_range::pixel_to_offset(f64::from(x), self.width);
        let (mut start, mut end) = match gesture.edge {
            ResizeEdge::Start => (offset, gesture.draft.end),
            ResizeEdge::End => (gesture.draft.start, offset),
        };

        // Crossing the anchor swaps the bounds and hands the drag over to the other edge
        if start > end {
            std::mem::swap(&mut start, &mut end);
            gesture.edge = gesture.edge.flipped();
        }

        gesture.draft = OffsetRange { start, end };
        self.latch_min_width();
        self.touch();
    }

    pub fn pointer_up(&mut self) {
        let Some(gesture) = self.gesture.take() else {
            return;
        };
        self.touch();

        let Some(duration) = self.duration else {
            log::debug!("[Selection] Gesture ended without decoded audio, ignoring");
            return;
        };

        if self.has_min_width(&gesture.draft) {
            self.committed = Some(gesture.draft);
            self.emit(SelectionEvent::RangeChanged(Some(gesture.draft.to_time(duration))));
        } else {
            self.committed = None;
            self.emit(SelectionEvent::RangeChanged(None));
            self.emit(SelectionEvent::Seek(time_range::offset_to_time(
                gesture.draft.start,
                duration,
            )));
        }
    }

    /// Starts a touch gesture at the first active touch point.
    pub fn touch_start(&mut self, touches: &[f32]) {
        match first_touch(touches) {
            Ok(x) => self.begin(x, InputSource::Touch),
            Err(error) => log::debug!("[Selection] Ignoring touch start: {error}"),
        }
    }

    pub fn touch_move(&mut self, touches: &[f32]) {
        match first_touch(touches) {
            Ok(x) => self.pointer_move(x),
            Err(error) => log::debug!("[Selection] Ignoring touch move: {error}"),
        }
    }

    pub fn touch_end(&mut self) {
        self.pointer_up();
    }

    /// Cursor for a pointer hovering at `x`.
    pub fn cursor_at(&self, x: f32) -> CursorKind {
        match self.gesture {
            Some(gesture) if gesture.kind == GestureKind::Resize => CursorKind::Resize,
            Some(_) => CursorKind::Text,
            None => {
                let offset = time_range::pixel_to_offset(f64::from(x), self.width);
                if self.edge_at(offset).is_some() {
                    CursorKind::Resize
                } else {
                    CursorKind::Text
                }
            }
        }
    }

    /// Whether a gesture is in progress; input outside the widget must keep flowing in.
    pub fn is_capturing(&self) -> bool {
        self.gesture.is_some()
    }

    /// Whether native scrolling must be held back for an active touch gesture.
    pub fn suppresses_native_gestures(&self) -> bool {
        matches!(self.gesture, Some(gesture) if gesture.source == InputSource::Touch)
    }

    /// The committed selection in seconds.
    pub fn committed_range(&self) -> Option<TimeRange> {
        let duration = self.duration?;
        self.committed.map(|range| range.to_time(duration))
    }

    /// Range the selection layer should show: the draft once it is visible, else the
    /// committed range.
    pub fn display_range(&self) -> Option<OffsetRange> {
        match self.gesture {
            Some(gesture) if gesture.ignore_min_width || self.has_min_width(&gesture.draft) => {
                Some(gesture.draft)
            }
            Some(_) => None,
            None => self.committed,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn begin(&mut self, x: f32, source: InputSource) {
        let offset = time_range::pixel_to_offset(f64::from(x), self.width);

        let gesture = match (self.committed, self.edge_at(offset)) {
            (Some(committed), Some(edge)) => Gesture {
                kind: GestureKind::Resize,
                source,
                edge,
                draft: committed,
                ignore_min_width: false,
            },
            _ => {
                // Stale selection disappears right away, the new one is announced on release
                self.committed = None;
                Gesture {
                    kind: GestureKind::Create,
                    source,
                    edge: ResizeEdge::End,
                    draft: OffsetRange::at(offset),
                    ignore_min_width: false,
                }
            }
        };

        self.gesture = Some(gesture);
        self.latch_min_width();
        self.touch();
    }

    fn edge_at(&self, offset: f64) -> Option<ResizeEdge> {
        let range = self.committed?;
        let tolerance = self.config.resize_edge_width;

        if (offset - range.start).abs() * self.width <= tolerance {
            Some(ResizeEdge::Start)
        } else if (offset - range.end).abs() * self.width <= tolerance {
            Some(ResizeEdge::End)
        } else {
            None
        }
    }

    fn has_min_width(&self, range: &OffsetRange) -> bool {
        range.pixel_width(self.width) >= self.config.min_range_width
    }

    fn latch_min_width(&mut self) {
        let width = self.width;
        let min = self.config.min_range_width;
        if let Some(gesture) = self.gesture.as_mut() {
            if gesture.draft.pixel_width(width) >= min {
                gesture.ignore_min_width = true;
            }
        }
    }

    fn emit(&self, event: SelectionEvent) {
        log::debug!("[Selection] {event:?}");
        if self.events.send(event).is_err() {
            log::warn!("[Selection] Nobody listens to selection events anymore");
        }
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

fn first_touch(touches: &[f32]) -> Result<f32, GestureInputError> {
    touches.first().copied().ok_or(GestureInputError::NoActiveTouch)
}

/// Colors of the selection layer.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionStyle {
    pub fill: Color32,
    pub edge: Color32,
}

impl Default for SelectionStyle {
    fn default() -> Self {
        Self {
            fill: Color32::from_rgba_unmultiplied(255, 165, 0, 51),
            edge: Color32::from_rgb(255, 165, 0),
        }
    }
}

/// Clears `surface` and draws `range` as a translucent band with edge markers.
pub fn draw_selection(
    surface: &mut impl Surface,
    range: Option<OffsetRange>,
    style: &SelectionStyle,
) {
    surface.clear();

    let Some(range) = range else {
        return;
    };

    let size = surface.size();
    let start = (range.start * f64::from(size.x)) as f32;
    let end = (range.end * f64::from(size.x)) as f32;

    surface.fill_rect(
        Rect::from_min_max(Pos2::new(start, 0.0), Pos2::new(end, size.y)),
        style.fill,
    );
    surface.vline(start, 1.0, style.edge);
    surface.vline(end, 1.0, style.edge);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::Receiver;

    const WIDTH: f32 = 1000.0;

    fn engine(duration: f64) -> (SelectionEngine, Receiver<SelectionEvent>) {
        let (sender, receiver) = std::sync::mpsc::channel();
        let mut engine = SelectionEngine::new(SelectionConfig::default(), sender);
        engine.set_width(WIDTH);
        engine.set_duration(Some(duration));
        (engine, receiver)
    }

    fn events(receiver: &Receiver<SelectionEvent>) -> Vec<SelectionEvent> {
        receiver.try_iter().collect()
    }

    fn assert_range(event: &SelectionEvent, start: f64, end: f64) {
        match event {
            SelectionEvent::RangeChanged(Some(range)) => {
                assert!((range.start - start).abs() < 1e-9, "start {} != {start}", range.start);
                assert!((range.end - end).abs() < 1e-9, "end {} != {end}", range.end);
            }
            other => panic!("expected a committed range, got {other:?}"),
        }
    }

    #[test]
    fn move_without_gesture_is_ignored() {
        let (mut engine, receiver) = engine(100.0);
        let revision = engine.revision();
        engine.pointer_move(300.0);
        engine.pointer_up();

        assert_eq!(engine.revision(), revision);
        assert!(events(&receiver).is_empty());
    }

    #[test]
    fn new_gesture_clears_committed_range_immediately() {
        let (mut engine, receiver) = engine(100.0);
        engine.pointer_down(100.0);
        engine.pointer_move(400.0);
        engine.pointer_up();
        events(&receiver);
        assert!(engine.committed_range().is_some());

        engine.pointer_down(700.0);
        assert!(engine.committed_range().is_none());
        assert!(engine.display_range().is_none());
        // Nothing is announced until the gesture ends
        assert!(events(&receiver).is_empty());
    }

    #[test]
    fn crossing_swaps_edges_on_every_move() {
        let (mut engine, _receiver) = engine(100.0);
        engine.pointer_down(500.0);
        engine.pointer_move(600.0);
        engine.pointer_move(300.0);

        let draft = engine.display_range().unwrap();
        assert!((draft.start - 0.3).abs() < 1e-9);
        assert!((draft.end - 0.5).abs() < 1e-9);

        // The start edge follows the pointer now
        engine.pointer_move(200.0);
        let draft = engine.display_range().unwrap();
        assert!((draft.start - 0.2).abs() < 1e-9);
        assert!((draft.end - 0.5).abs() < 1e-9);
    }

    #[test]
    fn draft_below_min_width_is_hidden_until_latched() {
        let (sender, _receiver) = std::sync::mpsc::channel();
        let config = SelectionConfig {
            min_range_width: 20.0,
            ..SelectionConfig::default()
        };
        let mut engine = SelectionEngine::new(config, sender);
        engine.set_width(WIDTH);
        engine.set_duration(Some(10.0));

        engine.pointer_down(100.0);
        engine.pointer_move(110.0);
        assert!(engine.display_range().is_none());

        engine.pointer_move(130.0);
        assert!(engine.display_range().is_some());

        // Shrinking below the threshold again keeps the draft visible
        engine.pointer_move(105.0);
        assert!(engine.display_range().is_some());
    }

    #[test]
    fn latch_resets_per_gesture() {
        let (sender, _receiver) = std::sync::mpsc::channel();
        let config = SelectionConfig {
            min_range_width: 20.0,
            ..SelectionConfig::default()
        };
        let mut engine = SelectionEngine::new(config, sender);
        engine.set_width(WIDTH);
        engine.set_duration(Some(10.0));

        engine.pointer_down(100.0);
        engine.pointer_move(200.0);
        engine.pointer_up();

        engine.pointer_down(600.0);
        engine.pointer_move(605.0);
        assert!(engine.display_range().is_none());
    }

    #[test]
    fn hovering_edges_selects_resize_cursor() {
        let (mut engine, _receiver) = engine(100.0);
        assert_eq!(engine.cursor_at(100.0), CursorKind::Text);

        engine.pointer_down(100.0);
        assert_eq!(engine.cursor_at(100.0), CursorKind::Text);
        engine.pointer_move(200.0);
        engine.pointer_up();

        assert_eq!(engine.cursor_at(95.0), CursorKind::Resize);
        assert_eq!(engine.cursor_at(208.0), CursorKind::Resize);
        assert_eq!(engine.cursor_at(150.0), CursorKind::Text);

        // While resizing the cursor sticks to resize, wherever the pointer is
        engine.pointer_down(200.0);
        assert_eq!(engine.cursor_at(600.0), CursorKind::Resize);
    }

    #[test]
    fn start_edge_wins_when_both_are_in_reach() {
        let (mut engine, receiver) = engine(100.0);
        engine.pointer_down(100.0);
        engine.pointer_move(105.0);
        engine.pointer_up();
        events(&receiver);

        engine.pointer_down(103.0);
        engine.pointer_move(50.0);
        engine.pointer_up();
        assert_range(&events(&receiver)[0], 5.0, 10.5);
    }

    #[test]
    fn touch_without_points_is_a_no_op() {
        let (mut engine, receiver) = engine(100.0);
        engine.touch_start(&[]);
        assert!(!engine.is_capturing());

        engine.touch_start(&[200.0, 900.0]);
        assert!(engine.suppresses_native_gestures());
        engine.touch_move(&[]);
        engine.touch_move(&[400.0]);
        engine.touch_end();

        assert!(!engine.suppresses_native_gestures());
        assert_range(&events(&receiver)[0], 20.0, 40.0);
    }

    #[test]
    fn pointer_gestures_do_not_suppress_scrolling() {
        let (mut engine, _receiver) = engine(100.0);
        engine.pointer_down(10.0);
        assert!(engine.is_capturing());
        assert!(!engine.suppresses_native_gestures());
    }

    #[test]
    fn reset_drops_gesture_and_selection() {
        let (mut engine, receiver) = engine(100.0);
        engine.pointer_down(100.0);
        engine.pointer_move(300.0);
        engine.pointer_up();
        engine.pointer_down(500.0);
        engine.pointer_move(600.0);
        events(&receiver);

        engine.reset();
        assert!(!engine.is_capturing());
        assert!(engine.committed_range().is_none());
        assert!(engine.display_range().is_none());

        engine.pointer_up();
        assert!(events(&receiver).is_empty());
    }

    #[test]
    fn nothing_commits_without_duration() {
        let (sender, receiver) = std::sync::mpsc::channel();
        let mut engine = SelectionEngine::new(SelectionConfig::default(), sender);
        engine.set_width(WIDTH);
        engine.set_duration(Some(0.0));

        engine.pointer_down(100.0);
        engine.pointer_move(400.0);
        engine.pointer_up();

        assert!(engine.committed_range().is_none());
        assert!(events(&receiver).is_empty());
        assert!(!engine.is_capturing());
    }

    #[test]
    fn drag_outside_widget_clamps_to_edges() {
        let (mut engine, receiver) = engine(50.0);
        engine.pointer_down(800.0);
        engine.pointer_move(1500.0);
        engine.pointer_up();
        assert_range(&events(&receiver)[0], 40.0, 50.0);

        engine.pointer_down(300.0);
        engine.pointer_move(-40.0);
        engine.pointer_up();
        assert_range(&events(&receiver)[0], 0.0, 15.0);
    }

    #[test]
    fn selection_layer_draws_band_and_edges() {
        let mut stack = crate::layers::LayerStack::default();
        stack.resize(eframe::egui::Vec2::new(200.0, 40.0));
        let style = SelectionStyle::default();

        draw_selection(&mut stack.selection, Some(OffsetRange { start: 0.25, end: 0.5 }), &style);
        assert_eq!(stack.selection.primitives().len(), 3);

        draw_selection(&mut stack.selection, None, &style);
        assert!(stack.selection.primitives().is_empty());
    }
}
