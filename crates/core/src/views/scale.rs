/// Linear map from trace milliseconds to x pixels.
///
/// Domain is `[0, domain_max]`, range `[range_start, range_end]`. A zero
/// (or negative) domain maps every value to `range_start`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeScale {
    pub domain_max: f64,
    pub range_start: f64,
    pub range_end: f64,
}

impl TimeScale {
    pub fn new(domain_max: f64, range_start: f64, range_end: f64) -> Self {
        Self {
            domain_max,
            range_start,
            range_end,
        }
    }

    pub fn range_width(&self) -> f64 {
        self.range_end - self.range_start
    }

    /// Pixels per millisecond; zero for an empty domain.
    pub fn pixels_per_ms(&self) -> f64 {
        if self.domain_max > 0.0 && self.domain_max.is_finite() {
            self.range_width() / self.domain_max
        } else {
            0.0
        }
    }

    pub fn x(&self, ms: f64) -> f64 {
        self.range_start + ms * self.pixels_per_ms()
    }

    /// Inverse of [`x`](Self::x). `None` for an empty domain or range.
    pub fn ms_at(&self, x: f64) -> Option<f64> {
        let k = self.pixels_per_ms();
        (k != 0.0).then(|| (x - self.range_start) / k)
    }

    /// Round tick values covering the domain, at most about `count` of them,
    /// stepping by 1, 2 or 5 times a power of ten.
    pub fn ticks(&self, count: u32) -> Vec<f64> {
        if count == 0 || self.domain_max <= 0.0 || !self.domain_max.is_finite() {
            return Vec::new();
        }
        let step = tick_step(self.domain_max, count);
        if step <= 0.0 || !step.is_finite() {
            return Vec::new();
        }
        let last = (self.domain_max / step + 1e-9).floor() as i64;
        (0..=last).map(|i| i as f64 * step).collect()
    }
}

fn tick_step(span: f64, count: u32) -> f64 {
    let raw = span / f64::from(count);
    let power = raw.log10().floor();
    let base = 10f64.powf(power);
    let error = raw / base;
    let factor = if error >= 50f64.sqrt() {
        10.0
    } else if error >= 10f64.sqrt() {
        5.0
    } else if error >= 2f64.sqrt() {
        2.0
    } else {
        1.0
    };
    factor * base
}

/// Axis label: seconds with one decimal.
pub fn format_tick(ms: f64) -> String {
    format!("{:.1}s", ms / 1000.0)
}
