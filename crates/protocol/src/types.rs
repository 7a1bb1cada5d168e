use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    /// Inclusive on the top-left edge, exclusive on the bottom-right edge.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }
}

/// The visible drawing surface, in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Device pixel ratio.
    pub dpr: f64,
}

impl Viewport {
    pub fn sized(width: f64, height: f64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
            dpr: 1.0,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Translate-then-scale transform, composed the way `PushTransform` stacks.
///
/// Maps a point `p` to `p * scale + translate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    pub tx: f64,
    pub ty: f64,
    pub sx: f64,
    pub sy: f64,
}

impl Affine {
    pub const IDENTITY: Self = Self {
        tx: 0.0,
        ty: 0.0,
        sx: 1.0,
        sy: 1.0,
    };

    /// Compose a child transform (as pushed by `PushTransform`) onto `self`.
    pub fn then(&self, translate: Point, scale: Point) -> Self {
        Self {
            tx: self.tx + translate.x * self.sx,
            ty: self.ty + translate.y * self.sy,
            sx: self.sx * scale.x,
            sy: self.sy * scale.y,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(p.x * self.sx + self.tx, p.y * self.sy + self.ty)
    }

    pub fn apply_rect(&self, r: Rect) -> Rect {
        let origin = self.apply(Point::new(r.x, r.y));
        Rect::new(origin.x, origin.y, r.w * self.sx, r.h * self.sy)
    }

    /// Inverse mapping. Returns `None` for a degenerate (zero) scale.
    pub fn invert(&self, p: Point) -> Option<Point> {
        if self.sx == 0.0 || self.sy == 0.0 {
            return None;
        }
        Some(Point::new((p.x - self.tx) / self.sx, (p.y - self.ty) / self.sy))
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}
