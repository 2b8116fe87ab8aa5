use eframe::egui::Vec2;

/// Tracks the content size of a container across frames.
///
/// Sizes are recorded with [ResizeObserver::observe] while the widget lays itself out, and a
/// change is only reported by [ResizeObserver::take_change] on the following pass, so the
/// layout that caused it is never redrawn from inside itself. Several observations in one pass
/// collapse into one notification carrying the last size.
#[derive(Debug, Default)]
pub struct ResizeObserver {
    /// Last size reported to the consumer.
    reported: Option<Vec2>,
    /// Latest observed size, waiting to be reported.
    pending: Option<Vec2>,
}

impl ResizeObserver {
    /// Records the container size seen during the current layout pass.
    pub fn observe(&mut self, size: Vec2) {
        if self.reported == Some(size) {
            self.pending = None;
        } else {
            self.pending = Some(size);
        }
    }

    /// Whether a change is waiting for the next pass.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Returns the new size if it changed since the last notification.
    pub fn take_change(&mut self) -> Option<Vec2> {
        let size = self.pending.take()?;
        self.reported = Some(size);
        Some(size)
    }
}
