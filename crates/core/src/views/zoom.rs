use serde::{Deserialize, Serialize};
use tracelens_protocol::{Affine, Point};

use crate::config::ZoomConfig;

/// Uniform scale plus translation, `p ↦ p * k + (x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomTransform {
    pub x: f64,
    pub y: f64,
    pub k: f64,
}

impl ZoomTransform {
    pub const IDENTITY: Self = Self { x: 0.0, y: 0.0, k: 1.0 };

    pub fn to_affine(self) -> Affine {
        Affine {
            tx: self.x,
            ty: self.y,
            sx: self.k,
            sy: self.k,
        }
    }

    /// Screen point back to content coordinates.
    pub fn invert(self, p: Point) -> Point {
        Point::new((p.x - self.x) / self.k, (p.y - self.y) / self.k)
    }

    fn lerp(self, to: Self, t: f64) -> Self {
        Self {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
            k: self.k + (to.k - self.k) * t,
        }
    }
}

impl Default for ZoomTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Cubic in-out easing on `[0, 1]`.
pub fn ease_cubic_in_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0) * 2.0;
    if t <= 1.0 {
        t * t * t / 2.0
    } else {
        let t = t - 2.0;
        (t * t * t + 2.0) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Transition {
    from: ZoomTransform,
    to: ZoomTransform,
    started_at_ms: f64,
    duration_ms: f64,
}

impl Transition {
    fn sample(&self, now_ms: f64) -> (ZoomTransform, bool) {
        if self.duration_ms <= 0.0 {
            return (self.to, true);
        }
        let t = (now_ms - self.started_at_ms) / self.duration_ms;
        if t >= 1.0 {
            (self.to, true)
        } else {
            (self.from.lerp(self.to, ease_cubic_in_out(t)), false)
        }
    }
}

/// Pan/zoom state of the waterfall, with timed transitions.
///
/// Time is any monotonic millisecond clock supplied by the caller; the
/// state never reads a clock itself.
#[derive(Debug, Clone)]
pub struct ZoomState {
    config: ZoomConfig,
    current: ZoomTransform,
    transition: Option<Transition>,
}

impl ZoomState {
    pub fn new(config: ZoomConfig) -> Self {
        Self {
            config,
            current: ZoomTransform::IDENTITY,
            transition: None,
        }
    }

    pub fn config(&self) -> &ZoomConfig {
        &self.config
    }

    /// Transform to draw with at `now_ms`.
    pub fn sample(&self, now_ms: f64) -> ZoomTransform {
        match &self.transition {
            Some(tr) => tr.sample(now_ms).0,
            None => self.current,
        }
    }

    /// Where the state is heading (the current transform when idle).
    pub fn target(&self) -> ZoomTransform {
        self.transition.map_or(self.current, |tr| tr.to)
    }

    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    /// Settle a finished transition. Returns whether one is still running.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        if let Some(tr) = self.transition {
            let (value, done) = tr.sample(now_ms);
            if done {
                self.current = value;
                self.transition = None;
            }
        }
        self.transition.is_some()
    }

    fn clamp_scale(&self, k: f64) -> f64 {
        k.clamp(self.config.min_scale, self.config.max_scale)
    }

    fn animate_to(&mut self, to: ZoomTransform, duration_ms: f64, now_ms: f64) {
        let from = self.sample(now_ms);
        self.current = from;
        self.transition = Some(Transition {
            from,
            to,
            started_at_ms: now_ms,
            duration_ms,
        });
    }

    /// Scale by `factor` about `center`, keeping the content under `center`
    /// fixed. The result is clamped to the configured range.
    fn scaled_about(&self, base: ZoomTransform, factor: f64, center: Point) -> ZoomTransform {
        let k = self.clamp_scale(base.k * factor);
        let anchor = base.invert(center);
        ZoomTransform {
            x: center.x - anchor.x * k,
            y: center.y - anchor.y * k,
            k,
        }
    }

    pub fn zoom_in(&mut self, center: Point, now_ms: f64) {
        self.zoom_by(self.config.in_factor, center, now_ms);
    }

    pub fn zoom_out(&mut self, center: Point, now_ms: f64) {
        self.zoom_by(self.config.out_factor, center, now_ms);
    }

    /// Animated multiplicative zoom starting from wherever the state is
    /// heading, so repeated presses compound.
    pub fn zoom_by(&mut self, factor: f64, center: Point, now_ms: f64) {
        let to = self.scaled_about(self.target(), factor, center);
        tracing::debug!(factor, k = to.k, "zoom");
        self.animate_to(to, self.config.transition_ms, now_ms);
    }

    /// Animate back to the identity transform. Calling it again while
    /// already there, or already heading there, changes nothing.
    pub fn fit(&mut self, now_ms: f64) {
        if self.target() == ZoomTransform::IDENTITY {
            return;
        }
        tracing::debug!("fit to screen");
        self.animate_to(ZoomTransform::IDENTITY, self.config.fit_transition_ms, now_ms);
    }

    /// Immediate zoom about a pointer position (wheel, pinch).
    pub fn zoom_at(&mut self, point: Point, factor: f64, now_ms: f64) {
        let base = self.sample(now_ms);
        self.transition = None;
        self.current = self.scaled_about(base, factor, point);
    }

    /// Immediate translation in screen pixels.
    pub fn pan(&mut self, dx: f64, dy: f64, now_ms: f64) {
        let base = self.sample(now_ms);
        self.transition = None;
        self.current = ZoomTransform {
            x: base.x + dx,
            y: base.y + dy,
            k: base.k,
        };
    }

    /// Jump to identity without animating, used when a new trace loads.
    pub fn reset(&mut self) {
        self.current = ZoomTransform::IDENTITY;
        self.transition = None;
    }
}

impl Default for ZoomState {
    fn default() -> Self {
        Self::new(ZoomConfig::default())
    }
}
