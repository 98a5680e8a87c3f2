//! Geometric containment tests in cell coordinates

use crate::spec::{Point, Shape};

impl Shape {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self {
            Shape::Rect { x: rx, y: ry, w, h } => in_box(x, y, *rx, *ry, *w, *h),
            Shape::RoundRect { x: rx, y: ry, w, h, r } => {
                round_rect_contains(x, y, *rx, *ry, *w, *h, *r)
            }
            Shape::Circle { cx, cy, r } => (x - cx).hypot(y - cy) <= *r,
            Shape::Polygon { points } => polygon_contains(points, x, y),
            Shape::Line { a, b, thickness } => segment_distance(*a, *b, (x, y)) <= thickness / 2.0,
        }
    }
}

/// Half-open: `[x, x+w) x [y, y+h)`.
#[inline]
fn in_box(px: f64, py: f64, x: f64, y: f64, w: f64, h: f64) -> bool {
    px >= x && px < x + w && py >= y && py < y + h
}

fn round_rect_contains(px: f64, py: f64, x: f64, y: f64, w: f64, h: f64, round: f64) -> bool {
    if !in_box(px, py, x, y, w, h) {
        return false;
    }
    let r = round.min(w / 2.0).min(h / 2.0).max(0.0);

    // Central cross: full-width band or full-height band
    if (px >= x + r && px < x + w - r) || (py >= y + r && py < y + h - r) {
        return true;
    }

    let cx = if px < x + r { x + r } else { x + w - r };
    let cy = if py < y + r { y + r } else { y + h - r };
    (px - cx).hypot(py - cy) <= r
}

/// Even-odd ray casting. Fewer than three vertices is not an area.
fn polygon_contains(points: &[Point], x: f64, y: f64) -> bool {
    if points.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let (xi, yi) = points[i];
        let (xj, yj) = points[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Distance from `p` to the closest point of segment `[a, b]`.
fn segment_distance(a: Point, b: Point, p: Point) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    (p.0 - cx).hypot(p.1 - cy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_boundary() {
        let rect = Shape::Rect { x: 0.0, y: 0.0, w: 10.0, h: 10.0 };
        assert!(rect.contains(0.0, 0.0));
        assert!(rect.contains(9.0, 9.0));
        assert!(!rect.contains(10.0, 10.0));
        assert!(!rect.contains(-1.0, 0.0));
        assert!(!rect.contains(10.0, 0.0));
    }

    #[test]
    fn test_round_rect_corners() {
        let rr = Shape::RoundRect { x: 0.0, y: 0.0, w: 10.0, h: 10.0, r: 3.0 };
        // Corner cell is outside the arc
        assert!(!rr.contains(0.0, 0.0));
        assert!(rr.contains(5.0, 0.0));
        assert!(rr.contains(0.0, 5.0));
        assert!(rr.contains(1.0, 1.0));
        assert!(rr.contains(9.0, 5.0));
        assert!(!rr.contains(9.9, 9.9));
        assert!(!rr.contains(10.0, 5.0));

        // Radius larger than half the box collapses to a circle-ish shape
        let pill = Shape::RoundRect { x: 0.0, y: 0.0, w: 4.0, h: 10.0, r: 50.0 };
        assert!(pill.contains(2.0, 5.0));
        assert!(!pill.contains(0.0, 0.0));

        let square = Shape::RoundRect { x: 0.0, y: 0.0, w: 4.0, h: 4.0, r: 0.0 };
        assert!(square.contains(0.0, 0.0));
    }

    #[test]
    fn test_circle() {
        let c = Shape::Circle { cx: 5.0, cy: 5.0, r: 2.0 };
        assert!(c.contains(5.0, 5.0));
        assert!(c.contains(7.0, 5.0));
        assert!(!c.contains(7.0, 7.0));
    }

    #[test]
    fn test_polygon() {
        let tri = Shape::Polygon { points: vec![(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)] };
        assert!(tri.contains(2.0, 2.0));
        assert!(!tri.contains(8.0, 8.0));
        assert!(!tri.contains(-1.0, 2.0));

        let concave = Shape::Polygon {
            points: vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (5.0, 4.0), (0.0, 10.0)],
        };
        assert!(concave.contains(2.0, 2.0));
        assert!(!concave.contains(5.0, 8.0));

        let degenerate = Shape::Polygon { points: vec![(0.0, 0.0), (10.0, 10.0)] };
        assert!(!degenerate.contains(5.0, 5.0));
    }

    #[test]
    fn test_line_thickness() {
        let line = Shape::Line { a: (0.0, 0.0), b: (10.0, 0.0), thickness: 2.0 };
        assert!(line.contains(5.0, 1.0));
        assert!(!line.contains(5.0, 1.5));
        // Clamped to the endpoint, not the infinite line
        assert!(!line.contains(12.0, 0.0));
        assert!(line.contains(11.0, 0.0));

        let dot = Shape::Line { a: (3.0, 3.0), b: (3.0, 3.0), thickness: 2.0 };
        assert!(dot.contains(3.0, 4.0));
        assert!(!dot.contains(3.0, 5.0));
    }
}
