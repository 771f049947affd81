use log::warn;
use mcds_common::{clamp, Mesh, Point3};
use serde::{Deserialize, Serialize};

/// Index of a voxel: `i` along x, `j` along y, `k` along z.
///
/// Per-voxel arrays are stored `[j, i, k]`; see [`VoxelIndex::array_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoxelIndex {
    pub i: usize,
    pub j: usize,
    pub k: usize,
}

impl VoxelIndex {
    pub fn new(i: usize, j: usize, k: usize) -> Self {
        VoxelIndex { i, j, k }
    }

    /// Position in a `(ny, nx, nz)` array.
    #[inline(always)]
    pub fn array_index(&self) -> [usize; 3] {
        [self.j, self.i, self.k]
    }
}

/// Distance between neighbouring voxel centers along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spacing {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
}

impl Spacing {
    pub fn as_point(&self) -> Point3 {
        Point3::new(self.dx, self.dy, self.dz)
    }
}

/// Position of `value` in `axis`, matched within `tolerance`.
pub fn axis_index(axis: &[f64], value: f64, tolerance: f64) -> Option<usize> {
    axis.iter().position(|&c| (c - value).abs() < tolerance)
}

/// Mean distance between consecutive coordinates; `None` for a single-plane axis.
pub fn axis_spacing(axis: &[f64]) -> Option<f64> {
    if axis.len() < 2 {
        return None;
    }
    let first = axis[0];
    let last = axis[axis.len() - 1];
    Some((last - first) / (axis.len() - 1) as f64)
}

fn differs(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() > tolerance * a.abs().max(b.abs()).max(1.0)
}

/// False when some step along `axis` differs from the mean step beyond `tolerance`.
pub fn axis_is_uniform(axis: &[f64], tolerance: f64) -> bool {
    match axis_spacing(axis) {
        Some(mean) => !axis.windows(2).any(|w| differs(w[1] - w[0], mean, tolerance)),
        None => true,
    }
}

/// False when the per-axis spacings are not all equal within `tolerance`.
pub fn spacings_agree(spacings: &[f64], tolerance: f64) -> bool {
    !spacings.windows(2).any(|w| differs(w[0], w[1], tolerance))
}

/// Computes the voxel spacing of `mesh`, warning (never failing) when spacing
/// varies along an axis or between axes by more than `tolerance`.
///
/// A single-plane axis (the z axis of a 2-D run) borrows the spacing of the
/// other axes; a mesh with a single voxel falls back to the edge of a cube
/// with that voxel's volume.
pub fn mesh_spacing(mesh: &Mesh, tolerance: f64) -> Spacing {
    let axes = [
        ("x", &mesh.x_coordinates),
        ("y", &mesh.y_coordinates),
        ("z", &mesh.z_coordinates),
    ];

    for (label, axis) in axes.iter() {
        if !axis_is_uniform(axis, tolerance) {
            warn!("{} grid spacing is not uniform (mean {:.6}).", label, axis_spacing(axis).unwrap_or(0.0));
        }
    }

    let per_axis: Vec<Option<f64>> = axes.iter().map(|(_, axis)| axis_spacing(axis)).collect();
    let defined: Vec<f64> = per_axis.iter().flatten().copied().collect();
    if !spacings_agree(&defined, tolerance) {
        warn!("Grid spacing may be axis dependent ({:?}).", per_axis);
    }

    let fallback = defined.first().copied().unwrap_or_else(|| {
        mesh.voxel_volumes
            .first()
            .copied()
            .filter(|v| *v > 0.0)
            .map(f64::cbrt)
            .unwrap_or(0.0)
    });

    Spacing {
        dx: per_axis[0].unwrap_or(fallback),
        dy: per_axis[1].unwrap_or(fallback),
        dz: per_axis[2].unwrap_or(fallback),
    }
}

/// Result of locating a point on the mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelLookup {
    pub index: VoxelIndex,
    /// True when at least one coordinate was outside the mesh and got clamped.
    pub clamped: bool,
}

/// Finds the voxel whose center is nearest to `point`.
///
/// Each coordinate outside the span of voxel centers is clamped to the
/// nearest boundary independently, and a warning is logged per clamped axis.
pub fn locate_voxel(mesh: &Mesh, spacing: &Spacing, point: Point3) -> VoxelLookup {
    let lower = mesh.min_corner();
    let upper = mesh.max_corner();
    let mut clamped = false;

    let mut axis = |label: &str, value: f64, min: f64, max: f64, step: f64, len: usize| -> usize {
        let bounded = clamp(value, min, max);
        if bounded != value {
            clamped = true;
            let side = if value > max { "max" } else { "min" };
            warn!(
                "Position out of bounds: {} out of bounds in locate_voxel({}, {}, {}). Setting {} = {}_{}!",
                label, point.x, point.y, point.z, label, label, side
            );
        }
        if len <= 1 || step <= 0.0 {
            return 0;
        }
        let idx = ((bounded - min) / step).round();
        // Clamp to grid dimensions to handle rounding at the upper edge
        (idx.max(0.0) as usize).min(len - 1)
    };

    let i = axis("x", point.x, lower.x, upper.x, spacing.dx, mesh.x_coordinates.len());
    let j = axis("y", point.y, lower.y, upper.y, spacing.dy, mesh.y_coordinates.len());
    let k = axis("z", point.z, lower.z, upper.z, spacing.dz, mesh.z_coordinates.len());

    VoxelLookup { index: VoxelIndex::new(i, j, k), clamped }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Mesh {
        let volume = 20.0 * 20.0 * 20.0;
        let count = x.len() * y.len() * z.len();
        Mesh {
            x_coordinates: x,
            y_coordinates: y,
            z_coordinates: z,
            voxel_centers: Vec::new(),
            voxel_volumes: vec![volume; count],
        }
    }

    #[test]
    fn test_axis_index_matches_within_tolerance() {
        let axis = [-10.0, 10.0, 30.0];
        assert_eq!(axis_index(&axis, 10.0 + 1e-12, 1e-10), Some(1));
        assert_eq!(axis_index(&axis, 11.0, 1e-10), None);
    }

    #[test]
    fn test_spacing_for_2d_mesh_borrows_xy_spacing() {
        let m = mesh(vec![-10.0, 10.0, 30.0], vec![-10.0, 10.0], vec![0.0]);
        let spacing = mesh_spacing(&m, 1e-10);
        assert_eq!(spacing, Spacing { dx: 20.0, dy: 20.0, dz: 20.0 });
    }

    #[test]
    fn test_spacing_single_voxel_uses_volume() {
        let m = mesh(vec![0.0], vec![0.0], vec![0.0]);
        let spacing = mesh_spacing(&m, 1e-10);
        assert!((spacing.dx - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_axis_dependent_spacing_is_kept_per_axis() {
        let m = mesh(vec![0.0, 10.0, 20.0], vec![0.0, 5.0], vec![0.0]);
        let spacing = mesh_spacing(&m, 1e-10);
        assert_eq!(spacing.dx, 10.0);
        assert_eq!(spacing.dy, 5.0);
    }

    #[test]
    fn test_irregular_spacing_is_detected() {
        assert!(axis_is_uniform(&[0.0, 10.0, 20.0], 1e-10));
        assert!(axis_is_uniform(&[0.0], 1e-10));
        assert!(!axis_is_uniform(&[0.0, 10.0, 25.0], 1e-10));

        assert!(spacings_agree(&[10.0, 10.0 + 1e-12], 1e-10));
        assert!(!spacings_agree(&[10.0, 5.0], 1e-10));
        assert!(spacings_agree(&[], 1e-10));
    }

    #[test]
    fn test_locate_rounds_to_nearest_center() {
        let m = mesh(vec![0.0, 10.0, 20.0], vec![0.0, 10.0, 20.0], vec![0.0]);
        let spacing = mesh_spacing(&m, 1e-10);
        let lookup = locate_voxel(&m, &spacing, Point3::new(14.0, 6.0, 0.0));
        assert_eq!(lookup.index, VoxelIndex::new(1, 1, 0));
        assert!(!lookup.clamped);
        assert_eq!(lookup.index.array_index(), [1, 1, 0]);
    }

    #[test]
    fn test_locate_clamps_each_axis_independently() {
        let m = mesh(vec![0.0, 10.0, 20.0], vec![0.0, 10.0, 20.0], vec![0.0]);
        let spacing = mesh_spacing(&m, 1e-10);
        let lookup = locate_voxel(&m, &spacing, Point3::new(95.0, -40.0, 3.0));
        assert_eq!(lookup.index, VoxelIndex::new(2, 0, 0));
        assert!(lookup.clamped);
    }
}
