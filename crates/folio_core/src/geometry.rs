//! Coordinate transforms between screen space, the scrollable viewer
//! wrapper's content space, and the raster surface's native pixel grid.

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle in CSS pixels. Width and height are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn at(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    /// Rectangle spanned by two drag corners, in any order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self::new(
            a.x.min(b.x),
            a.y.min(b.y),
            (a.x - b.x).abs(),
            (a.y - b.y).abs(),
        )
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// Integer rectangle on a raster's native pixel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Maps a screen-space pointer into the wrapper's scrolled content space.
pub fn wrapper_point(pointer: Point, wrapper_origin: Point, scroll_offset: Point) -> Point {
    Point::new(
        pointer.x - wrapper_origin.x + scroll_offset.x,
        pointer.y - wrapper_origin.y + scroll_offset.y,
    )
}

/// Converts a rectangle given relative to the surface's displayed box into
/// native pixels, scaling each axis by `native / displayed`.
///
/// The origin is floored and the far edge ceiled so partially covered pixels
/// are kept; the result is clamped to the native grid.
pub fn to_native_pixels(local: Rect, displayed: Size, native: Size) -> Option<PixelRect> {
    if displayed.width <= 0.0 || displayed.height <= 0.0 {
        return None;
    }
    let scale_x = native.width / displayed.width;
    let scale_y = native.height / displayed.height;

    let x0 = (local.x * scale_x).floor().clamp(0.0, native.width);
    let y0 = (local.y * scale_y).floor().clamp(0.0, native.height);
    let x1 = (local.right() * scale_x).ceil().clamp(0.0, native.width);
    let y1 = (local.bottom() * scale_y).ceil().clamp(0.0, native.height);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(PixelRect {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapper_point_adds_scroll() {
        let p = wrapper_point(
            Point::new(150.0, 220.0),
            Point::new(100.0, 200.0),
            Point::new(0.0, 400.0),
        );
        assert_eq!(p, Point::new(50.0, 420.0));
    }

    #[test]
    fn corners_normalize() {
        let r = Rect::from_corners(Point::new(30.0, 5.0), Point::new(10.0, 25.0));
        assert_eq!(r, Rect::new(10.0, 5.0, 20.0, 20.0));
    }

    #[test]
    fn disjoint_rects_do_not_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 10.0, 10.0);
        assert_eq!(a.intersect(&b), None);
        assert_eq!(
            a.intersect(&Rect::new(5.0, 5.0, 10.0, 10.0)),
            Some(Rect::new(5.0, 5.0, 5.0, 5.0))
        );
    }

    #[test]
    fn native_conversion_uses_per_axis_ratio() {
        // 1.5x device scale: 400x300 displayed, 600x450 backing pixels.
        let px = to_native_pixels(
            Rect::new(10.0, 20.0, 100.0, 50.0),
            Size::new(400.0, 300.0),
            Size::new(600.0, 450.0),
        )
        .unwrap();
        assert_eq!(
            px,
            PixelRect {
                x: 15,
                y: 30,
                width: 150,
                height: 75
            }
        );
    }

    #[test]
    fn native_conversion_keeps_partial_pixels_and_clamps() {
        let px = to_native_pixels(
            Rect::new(0.5, 0.5, 399.9, 10.2),
            Size::new(400.0, 300.0),
            Size::new(400.0, 300.0),
        )
        .unwrap();
        assert_eq!(
            px,
            PixelRect {
                x: 0,
                y: 0,
                width: 400,
                height: 11
            }
        );
        assert_eq!(
            to_native_pixels(Rect::new(1.0, 1.0, 5.0, 5.0), Size::new(0.0, 3.0), Size::new(1.0, 1.0)),
            None
        );
    }
}
