//! Geometry kernel
//!
//! Pure functions over document-space points. Document space has its origin
//! at the top-left of the page with Y increasing downward, matching the
//! rasterized page bitmap.

use serde::{Deserialize, Serialize};

/// Determinant threshold below which two segments are treated as parallel.
pub const PARALLEL_EPSILON: f64 = 1e-10;

/// A point in document (or screen) space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        distance(*self, other)
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }

    pub fn midpoint(&self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// Rotate about `pivot` by `degrees`, clockwise on screen (Y down).
    pub fn rotate_about(&self, pivot: Point, degrees: f64) -> Point {
        let (sin, cos) = degrees.to_radians().sin_cos();
        let dx = self.x - pivot.x;
        let dy = self.y - pivot.y;
        Point::new(
            pivot.x + dx * cos - dy * sin,
            pivot.y + dx * sin + dy * cos,
        )
    }

    pub fn from_array(raw: [f64; 2]) -> Point {
        Point::new(raw[0], raw[1])
    }

    pub fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x: min_x.min(max_x),
            min_y: min_y.min(max_y),
            max_x: min_x.max(max_x),
            max_y: min_y.max(max_y),
        }
    }

    /// Bounds spanning two opposite corners in any order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self::new(a.x, a.y, b.x, b.y)
    }

    /// Min/max extent of a point set, `None` when empty.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Bounds {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for point in iter {
            bounds.min_x = bounds.min_x.min(point.x);
            bounds.min_y = bounds.min_y.min(point.y);
            bounds.max_x = bounds.max_x.max(point.x);
            bounds.max_y = bounds.max_y.max(point.y);
        }
        Some(bounds)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.min_x, self.min_y)
    }

    /// Corners clockwise from top-left.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.min_x, self.min_y),
            Point::new(self.max_x, self.min_y),
            Point::new(self.max_x, self.max_y),
            Point::new(self.min_x, self.max_y),
        ]
    }

    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.min_x && point.x <= self.max_x && point.y >= self.min_y && point.y <= self.max_y
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains_bounds(&self, other: &Bounds) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    pub fn expand(&self, pad: f64) -> Bounds {
        Bounds {
            min_x: self.min_x - pad,
            min_y: self.min_y - pad,
            max_x: self.max_x + pad,
            max_y: self.max_y + pad,
        }
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Bounds {
        Bounds {
            min_x: self.min_x + dx,
            min_y: self.min_y + dy,
            max_x: self.max_x + dx,
            max_y: self.max_y + dy,
        }
    }

    /// Axis-aligned bounds of this box after rotating it about its center.
    pub fn rotated(&self, degrees: f64) -> Bounds {
        if degrees.rem_euclid(360.0) == 0.0 {
            return *self;
        }
        let center = self.center();
        let corners = self.corners().map(|corner| corner.rotate_about(center, degrees));
        Bounds::from_points(corners.iter()).unwrap_or(*self)
    }
}

pub fn distance(p: Point, q: Point) -> f64 {
    let dx = p.x - q.x;
    let dy = p.y - q.y;
    (dx * dx + dy * dy).sqrt()
}

/// Projection of `p` onto segment `a`-`b` with the parameter clamped to [0, 1].
pub fn closest_point_on_segment(p: Point, a: Point, b: Point) -> Point {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx * dx + dy * dy;

    if length_sq < 1e-12 {
        return a;
    }

    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / length_sq).clamp(0.0, 1.0);
    Point::new(a.x + t * dx, a.y + t * dy)
}

pub fn point_to_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    distance(p, closest_point_on_segment(p, a, b))
}

/// Ray-casting parity test. Polygons with fewer than three vertices contain nothing.
pub fn point_in_polygon(p: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Intersection of segments `p1`-`p2` and `p3`-`p4`.
///
/// Returns `None` for parallel or coincident segments and when the crossing
/// falls outside either segment's [0, 1] parameter range.
pub fn segment_intersection(p1: Point, p2: Point, p3: Point, p4: Point) -> Option<Point> {
    let d1x = p2.x - p1.x;
    let d1y = p2.y - p1.y;
    let d2x = p4.x - p3.x;
    let d2y = p4.y - p3.y;

    let det = d1x * d2y - d1y * d2x;
    if det.abs() < PARALLEL_EPSILON {
        return None;
    }

    let t = ((p3.x - p1.x) * d2y - (p3.y - p1.y) * d2x) / det;
    let u = ((p3.x - p1.x) * d1y - (p3.y - p1.y) * d1x) / det;

    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(Point::new(p1.x + t * d1x, p1.y + t * d1y))
    } else {
        None
    }
}

pub fn polyline_length(points: &[Point]) -> f64 {
    points.windows(2).map(|pair| distance(pair[0], pair[1])).sum()
}

/// Shoelace area, independent of winding order.
pub fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let mut twice_area = 0.0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        twice_area += a.x * b.y - b.x * a.y;
    }
    twice_area.abs() / 2.0
}

/// Average of the vertices.
pub fn vertex_centroid(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(sx / n, sy / n))
}

/// The point halfway along a polyline by arc length.
pub fn path_midpoint(points: &[Point]) -> Option<Point> {
    match points {
        [] => None,
        [only] => Some(*only),
        _ => {
            let half = polyline_length(points) / 2.0;
            let mut walked = 0.0;
            for pair in points.windows(2) {
                let segment = distance(pair[0], pair[1]);
                if walked + segment >= half && segment > 0.0 {
                    let t = (half - walked) / segment;
                    return Some(Point::new(
                        pair[0].x + t * (pair[1].x - pair[0].x),
                        pair[0].y + t * (pair[1].y - pair[0].y),
                    ));
                }
                walked += segment;
            }
            points.last().copied()
        }
    }
}

/// Minimum distance from `p` to the edges of a path.
///
/// Closed paths include the edge from the last vertex back to the first.
pub fn distance_to_path(p: Point, points: &[Point], closed: bool) -> f64 {
    match points {
        [] => f64::INFINITY,
        [only] => distance(p, *only),
        _ => {
            let mut best = points
                .windows(2)
                .map(|pair| point_to_segment_distance(p, pair[0], pair[1]))
                .fold(f64::INFINITY, f64::min);
            if closed && points.len() > 2 {
                let (first, last) = (points[0], points[points.len() - 1]);
                best = best.min(point_to_segment_distance(p, last, first));
            }
            best
        }
    }
}

/// The path edge nearest to `p`, as `(index of the edge's first vertex, distance, foot point)`.
pub fn nearest_edge(p: Point, points: &[Point], closed: bool) -> Option<(usize, f64, Point)> {
    if points.len() < 2 {
        return None;
    }

    let edge_count = if closed && points.len() > 2 {
        points.len()
    } else {
        points.len() - 1
    };

    (0..edge_count)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % points.len()];
            let foot = closest_point_on_segment(p, a, b);
            (i, distance(p, foot), foot)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_distance() {
        assert!(approx(distance(Point::new(0.0, 0.0), Point::new(3.0, 4.0)), 5.0));
    }

    #[test]
    fn test_point_to_segment_clamps_projection() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert!(approx(point_to_segment_distance(Point::new(5.0, 3.0), a, b), 3.0));
        // Beyond the end the nearest point is the endpoint itself
        assert!(approx(point_to_segment_distance(Point::new(13.0, 4.0), a, b), 5.0));
    }

    #[test]
    fn test_point_to_degenerate_segment() {
        let a = Point::new(2.0, 2.0);
        assert!(approx(point_to_segment_distance(Point::new(5.0, 6.0), a, a), 5.0));
    }

    #[test]
    fn test_point_in_polygon() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        assert!(point_in_polygon(Point::new(5.0, 5.0), &square));
        assert!(!point_in_polygon(Point::new(15.0, 5.0), &square));
        assert!(!point_in_polygon(Point::new(5.0, 5.0), &square[..2]));
    }

    #[test]
    fn test_point_in_concave_polygon() {
        // U shape: the notch between the arms is outside
        let u = [
            Point::new(0.0, 0.0),
            Point::new(3.0, 0.0),
            Point::new(3.0, 8.0),
            Point::new(7.0, 8.0),
            Point::new(7.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        assert!(!point_in_polygon(Point::new(5.0, 4.0), &u));
        assert!(point_in_polygon(Point::new(1.0, 4.0), &u));
        assert!(point_in_polygon(Point::new(5.0, 9.0), &u));
    }

    #[test]
    fn test_parallel_segments_do_not_intersect() {
        let hit = segment_intersection(
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(1.0, 1.0),
        );
        assert!(hit.is_none());
    }

    #[test]
    fn test_collinear_segments_do_not_intersect() {
        let hit = segment_intersection(
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(3.0, 0.0),
        );
        assert!(hit.is_none());
    }

    #[test]
    fn test_unit_diagonals_cross_at_center() {
        let hit = segment_intersection(
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
            Point::new(1.0, 0.0),
        )
        .expect("diagonals cross");
        assert!(approx(hit.x, 0.5));
        assert!(approx(hit.y, 0.5));
    }

    #[test]
    fn test_intersection_outside_parameter_range() {
        // The infinite lines cross at (2, 2), beyond both segments
        let hit = segment_intersection(
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(4.0, 0.0),
            Point::new(3.0, 1.0),
        );
        assert!(hit.is_none());
    }

    #[test]
    fn test_unit_square_area_both_windings() {
        let ccw = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        let mut cw = ccw;
        cw.reverse();
        assert!(approx(polygon_area(&ccw), 1.0));
        assert!(approx(polygon_area(&cw), 1.0));
    }

    #[test]
    fn test_area_needs_three_points() {
        assert_eq!(polygon_area(&[Point::new(0.0, 0.0), Point::new(4.0, 4.0)]), 0.0);
    }

    #[test]
    fn test_polyline_length() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(3.0, 4.0),
            Point::new(3.0, 10.0),
        ];
        assert!(approx(polyline_length(&points), 11.0));
        assert_eq!(polyline_length(&points[..1]), 0.0);
    }

    #[test]
    fn test_bounds_from_points() {
        let points = [Point::new(4.0, -1.0), Point::new(-2.0, 7.0), Point::new(1.0, 1.0)];
        let bounds = Bounds::from_points(points.iter()).expect("non-empty");
        assert_eq!(bounds, Bounds::new(-2.0, -1.0, 4.0, 7.0));
        assert!(Bounds::from_points([].iter()).is_none());
    }

    #[test]
    fn test_bounds_containment() {
        let outer = Bounds::new(0.0, 0.0, 10.0, 10.0);
        assert!(outer.contains_bounds(&Bounds::new(1.0, 1.0, 9.0, 9.0)));
        assert!(!outer.contains_bounds(&Bounds::new(1.0, 1.0, 11.0, 9.0)));
        assert!(outer.contains_point(Point::new(10.0, 0.0)));
    }

    #[test]
    fn test_rotated_bounds_quarter_turn() {
        let bounds = Bounds::new(0.0, 0.0, 20.0, 10.0).rotated(90.0);
        assert!(approx(bounds.width(), 10.0));
        assert!(approx(bounds.height(), 20.0));
        assert!(approx(bounds.center().x, 10.0));
        assert!(approx(bounds.center().y, 5.0));
    }

    #[test]
    fn test_rotate_about_pivot() {
        let rotated = Point::new(10.0, 0.0).rotate_about(Point::new(0.0, 0.0), 90.0);
        assert!(approx(rotated.x, 0.0));
        assert!(approx(rotated.y, 10.0));
    }

    #[test]
    fn test_path_midpoint_by_arc_length() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 30.0),
        ];
        let mid = path_midpoint(&points).expect("non-empty");
        assert!(approx(mid.x, 10.0));
        assert!(approx(mid.y, 10.0));
    }

    #[test]
    fn test_nearest_edge_closed_path() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        // Closing edge runs from (0,10) back to (0,0)
        let (index, dist, foot) = nearest_edge(Point::new(-1.0, 5.0), &square, true).expect("edge");
        assert_eq!(index, 3);
        assert!(approx(dist, 1.0));
        assert!(approx(foot.x, 0.0));

        let (open_index, _, _) = nearest_edge(Point::new(-1.0, 5.0), &square, false).expect("edge");
        assert_ne!(open_index, 3);
    }

    #[test]
    fn test_distance_to_closed_path() {
        let tri = [Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(0.0, 10.0)];
        assert!(approx(distance_to_path(Point::new(-2.0, 5.0), &tri, true), 2.0));
        assert!(distance_to_path(Point::new(-2.0, 5.0), &tri, false) > 2.0);
    }
}
