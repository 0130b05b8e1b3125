//
// resample.rs
// Dicom-Resample-rs
//
// Recomputes the voxel grid for a requested spacing and fills it by trilinear interpolation.
//
// Thales Matheus Mendonça Santos - November 2025

use ndarray::Array3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ResampleError, Result};
use crate::interpolate::{to_sample, LinearInterpolator};
use crate::volume::Volume;

// Relative slack when rounding extent ratios up, so 20 x 2.5 / 1.25 stays 40.
const RATIO_TOLERANCE: f64 = 1e-9;

/// Target spacing per axis in `(x, y, z)` order. `0` keeps the input spacing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResampleRequest {
    spacing: [f64; 3],
}

impl ResampleRequest {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { spacing: [x, y, z] }
    }

    /// Keep every axis at its input spacing.
    pub fn preserve() -> Self {
        Self::default()
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    pub fn validate(&self) -> Result<()> {
        if self.spacing.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(ResampleError::InvalidSpacing {
                spacing: self.spacing,
            });
        }
        Ok(())
    }

    /// Output spacing for a given input spacing.
    pub fn resolve(&self, input_spacing: [f64; 3]) -> Result<[f64; 3]> {
        self.validate()?;
        let mut resolved = input_spacing;
        for (out, &requested) in resolved.iter_mut().zip(self.spacing.iter()) {
            if requested > 0.0 {
                *out = requested;
            }
        }
        Ok(resolved)
    }
}

/// Number of output samples needed to cover `input_size * input_spacing`.
pub fn output_size(input_size: [usize; 3], input_spacing: [f64; 3], output_spacing: [f64; 3]) -> [usize; 3] {
    let mut size = [0; 3];
    for axis in 0..3 {
        size[axis] = axis_size(input_size[axis], input_spacing[axis], output_spacing[axis]);
    }
    size
}

fn axis_size(input_size: usize, input_spacing: f64, output_spacing: f64) -> usize {
    if input_spacing == output_spacing {
        return input_size;
    }
    let extent = input_size as f64 * input_spacing;
    let ratio = input_size as f64 * (input_spacing / output_spacing);
    let mut size = (ratio * (1.0 - RATIO_TOLERANCE)).ceil().max(1.0) as usize;
    // Never drop tissue at the far boundary.
    if (size as f64) * output_spacing < extent * (1.0 - RATIO_TOLERANCE) {
        size += 1;
    }
    size
}

/// Identity transform + linear interpolation + constant value outside the input.
#[derive(Debug, Clone, Copy, Default)]
pub struct Resampler {
    request: ResampleRequest,
    default_value: i16,
}

impl Resampler {
    pub fn new(request: ResampleRequest) -> Self {
        Self {
            request,
            default_value: 0,
        }
    }

    /// Intensity assigned to output voxels that map outside the input.
    pub fn with_default_value(mut self, value: i16) -> Self {
        self.default_value = value;
        self
    }

    pub fn request(&self) -> &ResampleRequest {
        &self.request
    }

    /// Empty output grid (origin, spacing, direction and size) for `input`.
    pub fn output_grid(&self, input: &Volume) -> Result<Volume> {
        let spacing = self.request.resolve(input.spacing())?;
        let size = input.size();
        if size.iter().any(|&n| n == 0) {
            return Err(ResampleError::EmptyVolume { size });
        }
        let [nx, ny, nz] = output_size(size, input.spacing(), spacing);
        Volume::new(
            Array3::zeros((nz, ny, nx)),
            spacing,
            input.origin(),
            *input.direction(),
        )
    }

    pub fn resample(&self, input: &Volume) -> Result<Volume> {
        let grid = self.output_grid(input)?;
        if grid.same_grid(input) {
            debug!("Requested grid matches the input; resampling is the identity");
            return Ok(input.clone());
        }

        let [nx, ny, nz] = grid.size();
        info!(
            input_size = ?input.size(),
            input_spacing = ?input.spacing(),
            output_size = ?grid.size(),
            output_spacing = ?grid.spacing(),
            "Resampling volume"
        );

        // The output frame only differs from the input by per-axis scaling, so each
        // axis maps independently and can be tabulated once.
        let x_coords: Vec<f64> = (0..nx)
            .map(|i| input.physical_to_continuous_index(grid.index_to_physical([i as f64, 0.0, 0.0]))[0])
            .collect();
        let y_coords: Vec<f64> = (0..ny)
            .map(|j| input.physical_to_continuous_index(grid.index_to_physical([0.0, j as f64, 0.0]))[1])
            .collect();
        let z_coords: Vec<f64> = (0..nz)
            .map(|k| input.physical_to_continuous_index(grid.index_to_physical([0.0, 0.0, k as f64]))[2])
            .collect();

        let interpolator = LinearInterpolator::new(input.data().view());
        let interpolator = &interpolator;
        let (x_coords, y_coords) = (&x_coords, &y_coords);
        let default_value = self.default_value;

        let samples: Vec<i16> = z_coords
            .par_iter()
            .flat_map_iter(move |&z| {
                y_coords.iter().flat_map(move |&y| {
                    x_coords.iter().map(move |&x| {
                        let index = [x, y, z];
                        if interpolator.is_inside(index) {
                            to_sample(interpolator.evaluate(index))
                        } else {
                            default_value
                        }
                    })
                })
            })
            .collect();

        let data = Array3::from_shape_vec((nz, ny, nx), samples)
            .map_err(|e| ResampleError::InvalidGeometry(e.to_string()))?;
        grid.with_data(data)
    }
}

/// Resample `input` with the default (zero) outside value.
pub fn resample(input: &Volume, request: &ResampleRequest) -> Result<Volume> {
    Resampler::new(*request).resample(input)
}
