//! Block-space geometry for region bounds.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Integer block coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockVector {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockVector {
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Block containing a continuous position.
    #[must_use]
    pub fn from_f64(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: x.floor() as i32,
            y: y.floor() as i32,
            z: z.floor() as i32,
        }
    }

    #[must_use]
    fn component_min(self, other: Self) -> Self {
        Self::new(
            self.x.min(other.x),
            self.y.min(other.y),
            self.z.min(other.z),
        )
    }

    #[must_use]
    fn component_max(self, other: Self) -> Self {
        Self::new(
            self.x.max(other.x),
            self.y.max(other.y),
            self.z.max(other.z),
        )
    }
}

impl fmt::Display for BlockVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A polygon vertex on the horizontal plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point2 {
    pub x: i32,
    pub z: i32,
}

impl Point2 {
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoundsError {
    #[error("polygon needs at least 3 points (got {0})")]
    TooFewPoints(usize),
}

/// Spatial volume of a region.
///
/// Deserialization goes through the same constructors as code, so corners
/// are normalized and short polygons are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", try_from = "RawBounds")]
pub enum Bounds {
    /// Axis-aligned box, both corners inclusive.
    Cuboid { min: BlockVector, max: BlockVector },
    /// Horizontal polygon extruded between two heights (inclusive).
    Polygon {
        points: Vec<Point2>,
        min_y: i32,
        max_y: i32,
    },
}

/// Wire shape of [`Bounds`] before validation.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawBounds {
    Cuboid { min: BlockVector, max: BlockVector },
    Polygon {
        points: Vec<Point2>,
        min_y: i32,
        max_y: i32,
    },
}

impl TryFrom<RawBounds> for Bounds {
    type Error = BoundsError;

    fn try_from(raw: RawBounds) -> Result<Self, Self::Error> {
        match raw {
            RawBounds::Cuboid { min, max } => Ok(Bounds::cuboid(min, max)),
            RawBounds::Polygon {
                points,
                min_y,
                max_y,
            } => Bounds::polygon(points, min_y, max_y),
        }
    }
}

impl Bounds {
    /// Box spanning two arbitrary corners.
    #[must_use]
    pub fn cuboid(a: BlockVector, b: BlockVector) -> Self {
        Bounds::Cuboid {
            min: a.component_min(b),
            max: a.component_max(b),
        }
    }

    pub fn polygon(points: Vec<Point2>, y1: i32, y2: i32) -> Result<Self, BoundsError> {
        if points.len() < 3 {
            return Err(BoundsError::TooFewPoints(points.len()));
        }
        Ok(Bounds::Polygon {
            points,
            min_y: y1.min(y2),
            max_y: y1.max(y2),
        })
    }

    #[must_use]
    pub fn contains(&self, point: BlockVector) -> bool {
        match self {
            Bounds::Cuboid { min, max } => {
                (min.x..=max.x).contains(&point.x)
                    && (min.y..=max.y).contains(&point.y)
                    && (min.z..=max.z).contains(&point.z)
            }
            Bounds::Polygon {
                points,
                min_y,
                max_y,
            } => {
                (*min_y..=*max_y).contains(&point.y)
                    && polygon_contains(points, Point2::new(point.x, point.z))
            }
        }
    }

    /// Smallest box enclosing the volume.
    #[must_use]
    pub fn bounding_box(&self) -> (BlockVector, BlockVector) {
        match self {
            Bounds::Cuboid { min, max } => (*min, *max),
            Bounds::Polygon {
                points,
                min_y,
                max_y,
            } => {
                let (mut min_x, mut min_z) = (i32::MAX, i32::MAX);
                let (mut max_x, mut max_z) = (i32::MIN, i32::MIN);
                for p in points {
                    min_x = min_x.min(p.x);
                    min_z = min_z.min(p.z);
                    max_x = max_x.max(p.x);
                    max_z = max_z.max(p.z);
                }
                (
                    BlockVector::new(min_x, *min_y, min_z),
                    BlockVector::new(max_x, *max_y, max_z),
                )
            }
        }
    }

    /// Number of blocks inside the volume.
    #[must_use]
    pub fn volume(&self) -> u64 {
        match self {
            Bounds::Cuboid { min, max } => {
                let span = |lo: i32, hi: i32| (i64::from(hi) - i64::from(lo) + 1) as u64;
                span(min.x, max.x) * span(min.y, max.y) * span(min.z, max.z)
            }
            Bounds::Polygon {
                points,
                min_y,
                max_y,
            } => polygon_columns(points) * (i64::from(*max_y) - i64::from(*min_y) + 1) as u64,
        }
    }
}

/// Lattice points inside or on a simple polygon, by Pick's theorem:
/// `A + B/2 + 1` with `B` the lattice points on the boundary.
fn polygon_columns(points: &[Point2]) -> u64 {
    if points.len() < 3 {
        return 0;
    }
    let mut twice_area: i64 = 0;
    let mut boundary: u64 = 0;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        let (px, pz) = (i64::from(p.x), i64::from(p.z));
        let (qx, qz) = (i64::from(q.x), i64::from(q.z));
        twice_area += px * qz - qx * pz;
        boundary += gcd((qx - px).unsigned_abs(), (qz - pz).unsigned_abs());
    }
    (twice_area.unsigned_abs() + boundary) / 2 + 1
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Even-odd test; points lying on an edge count as inside.
fn polygon_contains(points: &[Point2], target: Point2) -> bool {
    let tx = i64::from(target.x);
    let tz = i64::from(target.z);
    if points.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = points.len() - 1;

    for i in 0..points.len() {
        let (xi, zi) = (i64::from(points[i].x), i64::from(points[i].z));
        let (xj, zj) = (i64::from(points[j].x), i64::from(points[j].z));
        j = i;

        // On-segment check: collinear and within the segment's box.
        let cross = (xj - xi) * (tz - zi) - (zj - zi) * (tx - xi);
        if cross == 0
            && tx >= xi.min(xj)
            && tx <= xi.max(xj)
            && tz >= zi.min(zj)
            && tz <= zi.max(zj)
        {
            return true;
        }

        if (zi > tz) != (zj > tz) {
            // x of the edge at height tz, compared without division
            let lhs = (tx - xi) * (zj - zi);
            let rhs = (xj - xi) * (tz - zi);
            let crosses = if zj > zi { lhs < rhs } else { lhs > rhs };
            if crosses {
                inside = !inside;
            }
        }
    }

    inside
}
