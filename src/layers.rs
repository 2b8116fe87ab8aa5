use eframe::egui::{self, Color32, Pos2, Rect, Vec2};

/// 2D drawing target used by the renderers.
pub trait Surface {
    /// Surface size in logical pixels.
    fn size(&self) -> Vec2;

    /// Removes everything drawn so far.
    fn clear(&mut self);

    fn fill_rect(&mut self, rect: Rect, color: Color32);

    /// Vertical line spanning the whole surface height at `x`.
    fn vline(&mut self, x: f32, width: f32, color: Color32);
}

/// A single recorded drawing operation, in layer local coordinates.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Rect { rect: Rect, color: Color32 },
    VLine { x: f32, width: f32, color: Color32 },
}

#[derive(Debug, Default)]
pub struct ShapeLayer {
    size: Vec2,
    primitives: Vec<Primitive>,
    dirty: bool,
}

impl ShapeLayer {
    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    fn set_size(&mut self, size: Vec2) {
        self.size = size;
    }

    /// Replays the layer onto `painter` with its origin at `origin`.
    pub fn paint(&self, painter: &egui::Painter, origin: Pos2) {
        let offset = origin.to_vec2();
        let height = self.size.y;

        for primitive in &self.primitives {
            match primitive {
                Primitive::Rect { rect, color } => {
                    painter.rect_filled(rect.translate(offset), 0.0, *color);
                }
                Primitive::VLine { x, width, color } => {
                    let x = origin.x + x;
                    painter.line_segment(
                        [Pos2::new(x, origin.y), Pos2::new(x, origin.y + height)],
                        egui::Stroke::new(*width, *color),
                    );
                }
            }
        }
    }
}

impl Surface for ShapeLayer {
    fn size(&self) -> Vec2 {
        self.size
    }

    fn clear(&mut self) {
        self.primitives.clear();
    }

    fn fill_rect(&mut self, rect: Rect, color: Color32) {
        self.primitives.push(Primitive::Rect { rect, color });
    }

    fn vline(&mut self, x: f32, width: f32, color: Color32) {
        self.primitives.push(Primitive::VLine { x, width, color });
    }
}

/// The three stacked layers of the waveform widget, bottom to top paint order is
/// waveform, playhead, selection.
#[derive(Debug, Default)]
pub struct LayerStack {
    pub waveform: ShapeLayer,
    pub selection: ShapeLayer,
    pub playhead: ShapeLayer,
}

impl LayerStack {
    /// Resizes all layers before anything gets redrawn, then marks every layer dirty.
    pub fn resize(&mut self, size: Vec2) {
        for layer in self.layers_mut() {
            layer.set_size(size);
        }
        for layer in self.layers_mut() {
            layer.mark_dirty();
        }
    }

    pub fn paint(&self, painter: &egui::Painter, origin: Pos2) {
        self.waveform.paint(painter, origin);
        self.playhead.paint(painter, origin);
        self.selection.paint(painter, origin);
    }

    fn layers_mut(&mut self) -> [&mut ShapeLayer; 3] {
        [&mut self.waveform, &mut self.selection, &mut self.playhead]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_updates_every_layer_and_marks_dirty() {
        let mut stack = LayerStack::default();
        stack.resize(Vec2::new(320.0, 90.0));

        for layer in [&stack.waveform, &stack.selection, &stack.playhead] {
            assert_eq!(layer.size(), Vec2::new(320.0, 90.0));
            assert!(layer.is_dirty());
        }
    }

    #[test]
    fn clear_drops_recorded_primitives() {
        let mut layer = ShapeLayer::default();
        layer.fill_rect(Rect::from_min_size(Pos2::ZERO, Vec2::splat(2.0)), Color32::WHITE);
        layer.vline(4.0, 1.0, Color32::RED);
        assert_eq!(layer.primitives().len(), 2);

        layer.clear();
        assert!(layer.primitives().is_empty());
    }
}
