// Prompt tracking module
// Decides, once per frame, whether a mask computation should fire

use crate::backend::Event;

/// A point prompt in window pixel coordinates. Snapshotted per compute call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Tracks the pointer and turns input events into at most one mask-compute
/// trigger per frame.
///
/// A left press always triggers. In hover mode the tracker also triggers
/// whenever the position at end of frame differs from the previous frame's,
/// which covers pointer motion that produced no qualifying discrete event in
/// the batch. Repeated identical positions never re-trigger.
#[derive(Debug)]
pub struct PromptTracker {
    x: f32,
    y: f32,
    x_last: f32,
    y_last: f32,
    hover_mode: bool,
}

impl Default for PromptTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptTracker {
    pub fn new() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            x_last: 0.0,
            y_last: 0.0,
            hover_mode: false,
        }
    }

    /// Enable or disable segment-on-hover.
    pub fn set_hover_mode(&mut self, enabled: bool) {
        self.hover_mode = enabled;
    }

    pub fn hover_mode(&self) -> bool {
        self.hover_mode
    }

    /// Current pointer position, for drawing the prompt marker.
    pub fn position(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }

    /// Process one frame's event batch. Returns the prompt point when a mask
    /// computation should fire this frame.
    pub fn process(&mut self, events: &[Event]) -> Option<Point> {
        let mut triggered = false;

        for event in events {
            match event {
                Event::LeftPressed { x, y } => {
                    self.x = *x;
                    self.y = *y;
                    triggered = true;
                }
                Event::PointerMoved { x, y } if self.hover_mode => {
                    self.x = *x;
                    self.y = *y;
                }
                _ => {}
            }
        }

        // Evaluated once per frame, not once per event: the pointer may have
        // reached a new position without a qualifying event in this batch.
        if self.hover_mode && (self.x != self.x_last || self.y != self.y_last) {
            triggered = true;
        }

        self.x_last = self.x;
        self.y_last = self.y;

        triggered.then(|| self.position())
    }

    /// Forget any pending hover delta, so an image swap does not fire a
    /// compute at the stale pointer position.
    pub fn reset(&mut self) {
        self.x_last = self.x;
        self.y_last = self.y;
    }
}
