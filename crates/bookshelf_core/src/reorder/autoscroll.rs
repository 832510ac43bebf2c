//! Edge-band autoscroll during a drag.
//!
//! # Responsibility
//! - Compute per-frame scroll steps from pointer depth into an edge band.
//! - Own the lifecycle of the per-frame callback through explicit
//!   `start`/`stop`.
//!
//! # Invariants
//! - At most one frame request is outstanding per controller.
//! - `stop` cancels the outstanding request; stale frames are ignored.

use crate::config::AutoscrollConfig;

/// Visible vertical range of the scrolling container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub top: f64,
    pub bottom: f64,
}

impl Viewport {
    pub fn new(top: f64, bottom: f64) -> Self {
        Self { top, bottom }
    }

    pub fn height(&self) -> f64 {
        (self.bottom - self.top).max(0.0)
    }
}

/// The scrolling container hosting the list.
pub trait ScrollContainer {
    fn viewport(&self) -> Viewport;

    /// Scrolls by `delta` (positive = down) and returns the distance
    /// actually scrolled after clamping at the content edges.
    fn scroll_by(&mut self, delta: f64) -> f64;
}

/// Opaque handle for one requested frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(pub u64);

/// Host-side per-frame callback scheduling.
pub trait FrameScheduler {
    /// Requests one callback on the next frame. The host later delivers the
    /// token back through the engine's frame entry point.
    fn request_frame(&mut self) -> FrameToken;

    /// Cancels a request that has not fired yet.
    fn cancel_frame(&mut self, token: FrameToken);
}

/// Scroll distance for one frame; negative scrolls up, zero outside the bands.
///
/// Speed grows linearly with depth into the band and is capped at
/// `max_step_px`, also when the pointer leaves the viewport.
pub fn autoscroll_step(pointer_y: f64, viewport: Viewport, config: &AutoscrollConfig) -> f64 {
    let band = config.edge_band_px.min(viewport.height() / 2.0);
    if band <= 0.0 {
        return 0.0;
    }

    let top_edge = viewport.top + band;
    let bottom_edge = viewport.bottom - band;
    if pointer_y < top_edge {
        let depth = ((top_edge - pointer_y) / band).min(1.0);
        -depth * config.max_step_px
    } else if pointer_y > bottom_edge {
        let depth = ((pointer_y - bottom_edge) / band).min(1.0);
        depth * config.max_step_px
    } else {
        0.0
    }
}

/// Owner of the autoscroll frame request.
#[derive(Debug, Default)]
pub struct AutoscrollController {
    pending: Option<FrameToken>,
}

impl AutoscrollController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    /// Requests the next frame unless one is already outstanding.
    pub fn start(&mut self, frames: &mut impl FrameScheduler) {
        if self.pending.is_none() {
            self.pending = Some(frames.request_frame());
        }
    }

    /// Cancels the outstanding frame, if any.
    pub fn stop(&mut self, frames: &mut impl FrameScheduler) {
        if let Some(token) = self.pending.take() {
            frames.cancel_frame(token);
        }
    }

    /// Consumes a delivered frame. Returns `false` for stale or foreign
    /// tokens, which must be ignored.
    pub fn accept_frame(&mut self, token: FrameToken) -> bool {
        if self.pending == Some(token) {
            self.pending = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{autoscroll_step, AutoscrollController, FrameScheduler, FrameToken, Viewport};
    use crate::config::AutoscrollConfig;

    #[derive(Default)]
    struct CountingFrames {
        next: u64,
        cancelled: Vec<FrameToken>,
    }

    impl FrameScheduler for CountingFrames {
        fn request_frame(&mut self) -> FrameToken {
            self.next += 1;
            FrameToken(self.next)
        }

        fn cancel_frame(&mut self, token: FrameToken) {
            self.cancelled.push(token);
        }
    }

    fn config() -> AutoscrollConfig {
        AutoscrollConfig {
            edge_band_px: 50.0,
            max_step_px: 20.0,
        }
    }

    #[test]
    fn step_is_zero_in_the_middle() {
        let viewport = Viewport::new(0.0, 500.0);
        assert_eq!(autoscroll_step(250.0, viewport, &config()), 0.0);
        assert_eq!(autoscroll_step(50.0, viewport, &config()), 0.0);
        assert_eq!(autoscroll_step(450.0, viewport, &config()), 0.0);
    }

    #[test]
    fn step_scales_with_depth_and_direction() {
        let viewport = Viewport::new(0.0, 500.0);
        assert_eq!(autoscroll_step(25.0, viewport, &config()), -10.0);
        assert_eq!(autoscroll_step(475.0, viewport, &config()), 10.0);
    }

    #[test]
    fn step_is_capped_outside_viewport() {
        let viewport = Viewport::new(100.0, 600.0);
        assert_eq!(autoscroll_step(-400.0, viewport, &config()), -20.0);
        assert_eq!(autoscroll_step(9_000.0, viewport, &config()), 20.0);
    }

    #[test]
    fn band_shrinks_for_short_viewports() {
        let viewport = Viewport::new(0.0, 40.0);
        // Band is 20px; 10px deep is half speed.
        assert_eq!(autoscroll_step(10.0, viewport, &config()), -10.0);
        assert_eq!(autoscroll_step(20.0, viewport, &config()), 0.0);
    }

    #[test]
    fn controller_keeps_one_request_and_cancels_on_stop() {
        let mut frames = CountingFrames::default();
        let mut controller = AutoscrollController::new();

        controller.start(&mut frames);
        controller.start(&mut frames);
        assert_eq!(frames.next, 1);
        assert!(controller.is_running());

        controller.stop(&mut frames);
        assert_eq!(frames.cancelled, vec![FrameToken(1)]);
        assert!(!controller.is_running());
        assert!(!controller.accept_frame(FrameToken(1)));
    }

    #[test]
    fn accepted_frame_clears_pending_request() {
        let mut frames = CountingFrames::default();
        let mut controller = AutoscrollController::new();
        controller.start(&mut frames);

        assert!(!controller.accept_frame(FrameToken(99)));
        assert!(controller.accept_frame(FrameToken(1)));
        assert!(!controller.is_running());

        controller.stop(&mut frames);
        assert!(frames.cancelled.is_empty());
    }
}
