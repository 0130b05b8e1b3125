//
// interpolate.rs
// Dicom-Resample-rs
//
// Trilinear sampling of a volume at continuous grid coordinates.
//
// Thales Matheus Mendonça Santos - November 2025

use ndarray::ArrayView3;

// Continuous indices this close to the buffer edge still count as inside.
const EDGE_SLACK: f64 = 1e-6;

pub(crate) struct LinearInterpolator<'a> {
    data: ArrayView3<'a, i16>,
    // (x, y, z) sizes
    size: [usize; 3],
}

impl<'a> LinearInterpolator<'a> {
    pub(crate) fn new(data: ArrayView3<'a, i16>) -> Self {
        let (depth, height, width) = data.dim();
        Self {
            data,
            size: [width, height, depth],
        }
    }

    /// A continuous index is inside when every component lies within the voxel
    /// extent `[-0.5, n - 0.5]`.
    #[inline]
    pub(crate) fn is_inside(&self, index: [f64; 3]) -> bool {
        index.iter().zip(self.size.iter()).all(|(&c, &n)| {
            n > 0 && c >= -0.5 - EDGE_SLACK && c <= n as f64 - 0.5 + EDGE_SLACK
        })
    }

    /// Trilinear interpolation over the 8 neighbours of `index` (x, y, z).
    /// Neighbours past the last sample are clamped to it.
    #[inline]
    pub(crate) fn evaluate(&self, index: [f64; 3]) -> f64 {
        let (x0, x1, dx) = neighbours(index[0], self.size[0]);
        let (y0, y1, dy) = neighbours(index[1], self.size[1]);
        let (z0, z1, dz) = neighbours(index[2], self.size[2]);

        let v = |z: usize, y: usize, x: usize| f64::from(self.data[[z, y, x]]);

        let c00 = lerp(v(z0, y0, x0), v(z0, y0, x1), dx);
        let c01 = lerp(v(z0, y1, x0), v(z0, y1, x1), dx);
        let c10 = lerp(v(z1, y0, x0), v(z1, y0, x1), dx);
        let c11 = lerp(v(z1, y1, x0), v(z1, y1, x1), dx);

        let c0 = lerp(c00, c01, dy);
        let c1 = lerp(c10, c11, dy);

        lerp(c0, c1, dz)
    }
}

#[inline]
fn neighbours(c: f64, n: usize) -> (usize, usize, f64) {
    let last = n - 1;
    let clamped = c.clamp(0.0, last as f64);
    let lower = clamped.floor() as usize;
    let upper = (lower + 1).min(last);
    (lower, upper, clamped - lower as f64)
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a.mul_add(1.0 - t, b * t)
}

/// Round to nearest and saturate into the `i16` range.
#[inline]
pub(crate) fn to_sample(value: f64) -> i16 {
    value.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}
