//
// volume.rs
// Dicom-Resample-rs
//
// In-memory 3-D image with its patient-space frame (origin, spacing, direction cosines).
//
// Thales Matheus Mendonça Santos - November 2025

use ndarray::{s, Array3, ArrayView2};

use crate::error::{ResampleError, Result};

/// 3x3 matrix stored row-major; column `c` is the direction of grid axis `c`.
pub type Direction = [[f64; 3]; 3];

pub const IDENTITY_DIRECTION: Direction = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

const ORTHONORMAL_TOLERANCE: f64 = 1e-4;

/// Scalar volume indexed `[z, y, x]`, with spacing and origin given in `(x, y, z)` order.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    data: Array3<i16>,
    spacing: [f64; 3],
    origin: [f64; 3],
    direction: Direction,
}

impl Volume {
    pub fn new(
        data: Array3<i16>,
        spacing: [f64; 3],
        origin: [f64; 3],
        direction: Direction,
    ) -> Result<Self> {
        if spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(ResampleError::InvalidGeometry(format!(
                "spacing must be positive, got {:?}",
                spacing
            )));
        }
        if origin.iter().any(|o| !o.is_finite()) {
            return Err(ResampleError::InvalidGeometry(format!(
                "origin must be finite, got {:?}",
                origin
            )));
        }
        if !is_orthonormal(&direction) {
            return Err(ResampleError::InvalidGeometry(format!(
                "direction cosines are not orthonormal: {:?}",
                direction
            )));
        }

        Ok(Self {
            data,
            spacing,
            origin,
            direction,
        })
    }

    /// Volume at the patient origin with identity direction cosines.
    pub fn from_data(data: Array3<i16>, spacing: [f64; 3]) -> Result<Self> {
        Self::new(data, spacing, [0.0; 3], IDENTITY_DIRECTION)
    }

    /// Same frame, different samples. Used by stages that only touch intensities.
    pub fn with_data(&self, data: Array3<i16>) -> Result<Self> {
        if data.dim() != self.data.dim() {
            return Err(ResampleError::InvalidGeometry(format!(
                "replacement data has shape {:?}, expected {:?}",
                data.dim(),
                self.data.dim()
            )));
        }
        Ok(Self {
            data,
            spacing: self.spacing,
            origin: self.origin,
            direction: self.direction,
        })
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Number of voxels along x, y and z.
    pub fn size(&self) -> [usize; 3] {
        let (depth, height, width) = self.data.dim();
        [width, height, depth]
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &Array3<i16> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array3<i16> {
        &mut self.data
    }

    pub fn into_data(self) -> Array3<i16> {
        self.data
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    pub fn direction(&self) -> &Direction {
        &self.direction
    }

    /// Patient-space direction of grid axis `axis` (0 = x, 1 = y, 2 = z).
    pub fn axis_direction(&self, axis: usize) -> [f64; 3] {
        [
            self.direction[0][axis],
            self.direction[1][axis],
            self.direction[2][axis],
        ]
    }

    pub fn slice_normal(&self) -> [f64; 3] {
        self.axis_direction(2)
    }

    /// Physical length covered by the grid along each axis (dimension x spacing).
    pub fn physical_extent(&self) -> [f64; 3] {
        let size = self.size();
        [
            size[0] as f64 * self.spacing[0],
            size[1] as f64 * self.spacing[1],
            size[2] as f64 * self.spacing[2],
        ]
    }

    /// Maps a (possibly fractional) `(x, y, z)` index to patient space.
    pub fn index_to_physical(&self, index: [f64; 3]) -> [f64; 3] {
        let scaled = [
            index[0] * self.spacing[0],
            index[1] * self.spacing[1],
            index[2] * self.spacing[2],
        ];
        let mut point = self.origin;
        for (row, p) in point.iter_mut().enumerate() {
            *p += (0..3).map(|c| self.direction[row][c] * scaled[c]).sum::<f64>();
        }
        point
    }

    /// Inverse of [`Volume::index_to_physical`]; the direction is orthonormal so its
    /// inverse is the transpose.
    pub fn physical_to_continuous_index(&self, point: [f64; 3]) -> [f64; 3] {
        let offset = [
            point[0] - self.origin[0],
            point[1] - self.origin[1],
            point[2] - self.origin[2],
        ];
        let mut index = [0.0; 3];
        for (axis, i) in index.iter_mut().enumerate() {
            let projected: f64 = (0..3).map(|r| self.direction[r][axis] * offset[r]).sum();
            *i = projected / self.spacing[axis];
        }
        index
    }

    /// Axial slice `index` as a `(rows, columns)` view.
    pub fn slice(&self, index: usize) -> Option<ArrayView2<'_, i16>> {
        if index >= self.data.dim().0 {
            return None;
        }
        Some(self.data.slice(s![index, .., ..]))
    }

    /// True when both volumes sample the same grid in patient space.
    pub fn same_grid(&self, other: &Volume) -> bool {
        self.size() == other.size()
            && self.spacing == other.spacing
            && self.origin == other.origin
            && self.direction == other.direction
    }
}

fn is_orthonormal(direction: &Direction) -> bool {
    (0..3).all(|a| {
        (0..3).all(|b| {
            let dot: f64 = (0..3).map(|r| direction[r][a] * direction[r][b]).sum();
            let expected = if a == b { 1.0 } else { 0.0 };
            (dot - expected).abs() <= ORTHONORMAL_TOLERANCE
        })
    })
}

pub(crate) fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub(crate) fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub(crate) fn normalize(v: [f64; 3]) -> Option<[f64; 3]> {
    let norm = dot(v, v).sqrt();
    if norm <= f64::EPSILON || !norm.is_finite() {
        return None;
    }
    Some([v[0] / norm, v[1] / norm, v[2] / norm])
}

/// Builds a direction matrix from the DICOM row and column cosines.
pub fn direction_from_orientation(row: [f64; 3], column: [f64; 3]) -> Option<Direction> {
    let row = normalize(row)?;
    let column = normalize(column)?;
    let normal = normalize(cross(row, column))?;
    Some([
        [row[0], column[0], normal[0]],
        [row[1], column[1], normal[1]],
        [row[2], column[2], normal[2]],
    ])
}
