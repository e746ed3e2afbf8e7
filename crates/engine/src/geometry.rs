use serde::{Deserialize, Serialize};
use std::ops::Sub;

/// Hit box of every tile, anchored at its top-left position.
pub const TILE_WIDTH: f64 = 100.0;
pub const TILE_HEIGHT: f64 = 50.0;

/// Canvas pixel coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[derive(Debug, Clone, Copy)]
struct Bounds {
    left: f64,
    right: f64,
    top: f64,
    bottom: f64,
}

impl Bounds {
    fn at(p: Point) -> Self {
        Self {
            left: p.x,
            right: p.x + TILE_WIDTH,
            top: p.y,
            bottom: p.y + TILE_HEIGHT,
        }
    }
}

/// Whether two tile boxes at `a` and `b` overlap. Touching edges count.
pub fn overlaps(a: Point, b: Point) -> bool {
    let a = Bounds::at(a);
    let b = Bounds::at(b);
    !(a.right < b.left || a.left > b.right || a.bottom < b.top || a.top > b.bottom)
}
