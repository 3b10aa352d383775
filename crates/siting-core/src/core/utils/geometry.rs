use nalgebra::Point2;
use std::collections::HashMap;

#[inline]
pub fn planar_distance(a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    nalgebra::distance(a, b)
}

/// Bit-exact key for a coordinate, treating `-0.0` and `0.0` as equal.
#[inline]
pub fn coordinate_key(point: &Point2<f64>) -> (u64, u64) {
    ((point.x + 0.0).to_bits(), (point.y + 0.0).to_bits())
}

/// Minimum distance from `origin` to any of `others`, or `None` if empty.
pub fn min_distance<'a>(
    origin: &Point2<f64>,
    others: impl IntoIterator<Item = &'a Point2<f64>>,
) -> Option<f64> {
    others
        .into_iter()
        .map(|p| planar_distance(origin, p))
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
}

/// Centre of the circle through `a`, `b` and `c`, or `None` if they are
/// collinear.
pub fn circumcenter(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> Option<Point2<f64>> {
    let ab = b - a;
    let ac = c - a;
    let d = 2.0 * (ab.x * ac.y - ab.y * ac.x);
    if d == 0.0 {
        return None;
    }
    let ab_sq = ab.norm_squared();
    let ac_sq = ac.norm_squared();
    Some(Point2::new(
        a.x + (ac.y * ab_sq - ab.y * ac_sq) / d,
        a.y + (ab.x * ac_sq - ac.x * ab_sq) / d,
    ))
}

/// Index of the first occurrence of every distinct coordinate, keyed by the
/// position of each later duplicate.
pub fn find_duplicate_coordinates(points: &[Point2<f64>]) -> HashMap<usize, usize> {
    let mut first_seen: HashMap<(u64, u64), usize> = HashMap::with_capacity(points.len());
    let mut duplicates = HashMap::new();
    for (index, point) in points.iter().enumerate() {
        let first = *first_seen.entry(coordinate_key(point)).or_insert(index);
        if first != index {
            duplicates.insert(index, first);
        }
    }
    duplicates
}
