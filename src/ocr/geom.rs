//! Bounding-polygon geometry for recognized lines.
//!
//! Polygons are eight numbers: top-left, top-right, bottom-right and
//! bottom-left corners as (x, y) pairs. Anything shorter is treated as
//! "no geometry" and measures zero.

pub(crate) const POLYGON_LEN: usize = 8;

pub(crate) fn height(polygon: &[f32]) -> f32 {
    let Some(p) = corners(polygon) else {
        return 0.0;
    };
    non_negative(p[7].max(p[5]) - p[1].min(p[3]))
}

pub(crate) fn width(polygon: &[f32]) -> f32 {
    let Some(p) = corners(polygon) else {
        return 0.0;
    };
    non_negative(p[2].max(p[4]) - p[0].min(p[6]))
}

/// A line reads vertically when its first edge (top-left to top-right)
/// climbs more than it runs.
pub(crate) fn is_vertical(polygon: &[f32]) -> bool {
    let Some(p) = corners(polygon) else {
        return false;
    };
    (p[3] - p[1]).abs() > (p[2] - p[0]).abs()
}

pub(crate) fn text_size(polygon: &[f32]) -> f32 {
    let height = height(polygon);
    let width = width(polygon);
    if height <= 0.0 || width <= 0.0 {
        return 0.0;
    }
    if is_vertical(polygon) { width } else { height }
}

/// Axis-aligned rectangle as a polygon, for backends that only report boxes.
pub(crate) fn rect_polygon(x: f32, y: f32, w: f32, h: f32) -> Vec<f32> {
    vec![x, y, x + w, y, x + w, y + h, x, y + h]
}

fn corners(polygon: &[f32]) -> Option<&[f32]> {
    if polygon.len() < POLYGON_LEN {
        return None;
    }
    let p = &polygon[..POLYGON_LEN];
    if p.iter().any(|value| !value.is_finite()) {
        return None;
    }
    Some(p)
}

fn non_negative(value: f32) -> f32 {
    if value > 0.0 { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_box_uses_height() {
        let polygon = rect_polygon(10.0, 20.0, 200.0, 40.0);
        assert_eq!(height(&polygon), 40.0);
        assert_eq!(width(&polygon), 200.0);
        assert!(!is_vertical(&polygon));
        assert_eq!(text_size(&polygon), 40.0);
    }

    #[test]
    fn spine_text_rotated_clockwise_uses_width() {
        // Reading top to bottom: the first edge runs down the page.
        let polygon = vec![60.0, 10.0, 60.0, 310.0, 30.0, 310.0, 30.0, 10.0];
        assert!(is_vertical(&polygon));
        assert_eq!(height(&polygon), 300.0);
        assert_eq!(width(&polygon), 30.0);
        assert_eq!(text_size(&polygon), 30.0);
    }

    #[test]
    fn spine_text_rotated_counter_clockwise_uses_width() {
        let polygon = vec![30.0, 310.0, 30.0, 10.0, 60.0, 10.0, 60.0, 310.0];
        assert!(is_vertical(&polygon));
        assert_eq!(width(&polygon), 30.0);
        assert_eq!(text_size(&polygon), 30.0);
    }

    #[test]
    fn short_polygon_measures_zero() {
        let polygon = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(height(&polygon), 0.0);
        assert_eq!(width(&polygon), 0.0);
        assert!(!is_vertical(&polygon));
        assert_eq!(text_size(&polygon), 0.0);
        assert_eq!(text_size(&[]), 0.0);
    }

    #[test]
    fn single_point_is_degenerate() {
        let polygon = vec![5.0; 8];
        assert_eq!(text_size(&polygon), 0.0);
    }

    #[test]
    fn flat_line_is_degenerate() {
        let polygon = rect_polygon(0.0, 10.0, 120.0, 0.0);
        assert_eq!(height(&polygon), 0.0);
        assert_eq!(width(&polygon), 120.0);
        assert_eq!(text_size(&polygon), 0.0);
    }

    #[test]
    fn non_finite_coordinates_measure_zero() {
        let polygon = vec![0.0, 0.0, f32::NAN, 0.0, 10.0, 10.0, 0.0, 10.0];
        assert_eq!(text_size(&polygon), 0.0);
    }

    #[test]
    fn measurements_never_negative() {
        let samples = [
            rect_polygon(0.0, 0.0, 10.0, 5.0),
            vec![10.0, 10.0, 0.0, 10.0, 0.0, 0.0, 10.0, 0.0],
            vec![3.0, 9.0, 1.0, 2.0, 8.0, 4.0, 6.0, 7.0],
            vec![0.0, 0.0, 5.0, 5.0, 0.0, 10.0, -5.0, 5.0],
        ];
        for polygon in samples {
            let (h, w, size) = (height(&polygon), width(&polygon), text_size(&polygon));
            assert!(h >= 0.0 && w >= 0.0);
            assert_eq!(size == 0.0, h == 0.0 || w == 0.0);
        }
    }
}
