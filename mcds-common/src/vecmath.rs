use serde::{Deserialize, Serialize};
use std::ops::Sub;

/// A point in simulation space, in the mesh's spatial units.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    /// Creates a new point.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Point3 { x, y, z }
    }

    /// Builds a point from an `[x, y, z]` triple.
    pub fn from_array(xyz: [f64; 3]) -> Self {
        Point3 { x: xyz[0], y: xyz[1], z: xyz[2] }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// True when every component lies strictly inside the box of the given
    /// half extents around `center`.
    pub fn strictly_within(self, center: Point3, half_extents: Point3) -> bool {
        let d = self - center;
        d.x.abs() < half_extents.x && d.y.abs() < half_extents.y && d.z.abs() < half_extents.z
    }

    /// Scales every component by `scalar`.
    pub fn scale(self, scalar: f64) -> Self {
        Point3 { x: self.x * scalar, y: self.y * scalar, z: self.z * scalar }
    }
}

impl Sub for Point3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self { x: self.x - other.x, y: self.y - other.y, z: self.z - other.z }
    }
}

/// Clamps a value between a minimum and maximum.
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strictly_within_excludes_faces() {
        let center = Point3::new(10.0, 10.0, 0.0);
        let half = Point3::new(10.0, 10.0, 10.0).scale(0.5);
        assert!(Point3::new(14.9, 5.1, 0.0).strictly_within(center, half));
        assert!(!Point3::new(15.0, 10.0, 0.0).strictly_within(center, half));
        assert!(!Point3::new(10.0, 10.0, -5.0).strictly_within(center, half));
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(25.0, 0.0, 20.0), 20.0);
        assert_eq!(clamp(-1.0, 0.0, 20.0), 0.0);
        assert_eq!(clamp(7.5, 0.0, 20.0), 7.5);
    }
}
