use crate::layers::Surface;
use crate::time_range;
use eframe::egui::Color32;

pub const PLAYHEAD_COLOR: Color32 = Color32::from_rgb(0xff, 0xa5, 0x00);

#[derive(Debug, Default)]
pub struct PlayheadOverlay {
    /// Position drawn last, [None] when the layer is empty.
    drawn: Option<f32>,
}

impl PlayheadOverlay {
    /// Whether drawing `current_time` would change the layer.
    pub fn needs_redraw(
        &self,
        surface: &impl Surface,
        current_time: Option<f64>,
        duration: f64,
    ) -> bool {
        self.drawn != marker_x(surface, current_time, duration)
    }

    /// Clears `surface` and draws the marker for `current_time`, if any.
    pub fn render(&mut self, surface: &mut impl Surface, current_time: Option<f64>, duration: f64) {
        surface.clear();

        let x = marker_x(surface, current_time, duration);
        if let Some(x) = x {
            surface.vline(x, 1.0, PLAYHEAD_COLOR);
        }
        self.drawn = x;
    }

    /// Forces the next [PlayheadOverlay::needs_redraw] to report a change.
    pub fn invalidate(&mut self) {
        self.drawn = Some(f32::NAN);
    }
}

fn marker_x(surface: &impl Surface, current_time: Option<f64>, duration: f64) -> Option<f32> {
    let time = current_time.filter(|t| t.is_finite())?;
    let offset = time_range::time_to_offset(time, duration).clamp(0.0, 1.0);
    Some((offset * f64::from(surface.size().x)) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{LayerStack, Primitive};
    use eframe::egui::Vec2;

    fn stack() -> LayerStack {
        let mut stack = LayerStack::default();
        stack.resize(Vec2::new(400.0, 60.0));
        stack
    }

    #[test]
    fn marker_follows_current_time() {
        let mut stack = stack();
        let mut overlay = PlayheadOverlay::default();

        overlay.render(&mut stack.playhead, Some(25.0), 100.0);
        assert_eq!(
            stack.playhead.primitives(),
            &[Primitive::VLine {
                x: 100.0,
                width: 1.0,
                color: PLAYHEAD_COLOR
            }]
        );
        assert!(!overlay.needs_redraw(&stack.playhead, Some(25.0), 100.0));
        assert!(overlay.needs_redraw(&stack.playhead, Some(26.0), 100.0));
    }

    #[test]
    fn missing_time_clears_the_layer() {
        let mut stack = stack();
        let mut overlay = PlayheadOverlay::default();
        overlay.render(&mut stack.playhead, Some(10.0), 100.0);

        assert!(overlay.needs_redraw(&stack.playhead, None, 100.0));
        overlay.render(&mut stack.playhead, None, 100.0);
        assert!(stack.playhead.primitives().is_empty());
    }

    #[test]
    fn invalidated_overlay_always_redraws() {
        let mut stack = stack();
        let mut overlay = PlayheadOverlay::default();
        overlay.render(&mut stack.playhead, None, 1.0);
        overlay.invalidate();
        assert!(overlay.needs_redraw(&stack.playhead, None, 1.0));
    }
}
