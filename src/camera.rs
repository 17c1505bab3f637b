#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

/// A point in either screen or page space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Stage transform: how the fixed-size page is placed inside the host viewport.
///
/// `offset_x` / `offset_y` are in CSS pixels.
/// `scale` is the stage scale factor (1.0 = one page px per CSS px).
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self { offset_x: 0.0, offset_y: 0.0, scale: 1.0 }
    }
}

impl Camera {
    /// Fit a page of `page_w`×`page_h` inside a `view_w`×`view_h` container,
    /// centered, with `padding` CSS pixels on every side. Never scales up past 1.
    #[must_use]
    pub fn fit(page_w: f64, page_h: f64, view_w: f64, view_h: f64, padding: f64) -> Self {
        let avail_w = (view_w - padding * 2.0).max(1.0);
        let avail_h = (view_h - padding * 2.0).max(1.0);
        if page_w <= 0.0 || page_h <= 0.0 {
            return Self::default();
        }
        let scale = (avail_w / page_w).min(avail_h / page_h).min(1.0);
        Self {
            offset_x: (view_w - page_w * scale) / 2.0,
            offset_y: (view_h - page_h * scale) / 2.0,
            scale,
        }
    }

    /// Convert a screen-space point (CSS pixels) to page coordinates.
    #[must_use]
    pub fn screen_to_page(&self, screen: Point) -> Point {
        Point {
            x: (screen.x - self.offset_x) / self.scale,
            y: (screen.y - self.offset_y) / self.scale,
        }
    }

    /// Convert a page-space point to screen coordinates (CSS pixels).
    #[must_use]
    pub fn page_to_screen(&self, page: Point) -> Point {
        Point {
            x: page.x * self.scale + self.offset_x,
            y: page.y * self.scale + self.offset_y,
        }
    }

    /// Convert a screen-space distance (pixels) to a page-space distance.
    #[must_use]
    pub fn screen_dist_to_page(&self, screen_dist: f64) -> f64 {
        screen_dist / self.scale
    }
}
