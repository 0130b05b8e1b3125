//
// export.rs
// Dicom-Resample-rs
//
// Writes a resampled volume to a single NIfTI-1 file (.nii or .nii.gz) in modality units.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::Path;

use ndarray::Array3;
use nifti::header::MAGIC_CODE_NIP1;
use nifti::writer::WriterOptions;
use nifti::NiftiHeader;
use tracing::info;

use crate::error::{ResampleError, Result};
use crate::interpolate::to_sample;
use crate::rescale::RescaleParameters;
use crate::volume::Volume;

/// NIfTI `xyzt_units` code for millimetres.
const UNITS_MM: u8 = 2;
/// NIfTI `sform_code` for scanner-anatomical coordinates.
const SFORM_SCANNER: i16 = 1;

/// Destination for the whole output volume as one file.
pub trait VolumeExporter {
    /// `volume` holds stored values; `rescale` maps them to modality values.
    fn export(&self, path: &Path, volume: &Volume, rescale: RescaleParameters) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NiftiExporter;

impl NiftiExporter {
    /// Header carrying spacing and the LPS -> RAS voxel-to-world affine.
    pub fn header(volume: &Volume) -> NiftiHeader {
        let spacing = volume.spacing();
        let origin = volume.origin();
        let direction = volume.direction();
        // DICOM patient space is LPS, NIfTI world space is RAS: flip x and y.
        let row = |r: usize, sign: f64| -> [f32; 4] {
            [
                (sign * direction[r][0] * spacing[0]) as f32,
                (sign * direction[r][1] * spacing[1]) as f32,
                (sign * direction[r][2] * spacing[2]) as f32,
                (sign * origin[r]) as f32,
            ]
        };

        NiftiHeader {
            pixdim: [
                1.0,
                spacing[0] as f32,
                spacing[1] as f32,
                spacing[2] as f32,
                0.0,
                0.0,
                0.0,
                0.0,
            ],
            xyzt_units: UNITS_MM,
            sform_code: SFORM_SCANNER,
            srow_x: row(0, -1.0),
            srow_y: row(1, -1.0),
            srow_z: row(2, 1.0),
            scl_slope: 1.0,
            scl_inter: 0.0,
            magic: *MAGIC_CODE_NIP1,
            ..NiftiHeader::default()
        }
    }
}

impl VolumeExporter for NiftiExporter {
    fn export(&self, path: &Path, volume: &Volume, rescale: RescaleParameters) -> Result<()> {
        let values: Array3<i16> = if rescale.is_identity() {
            volume.data().clone()
        } else {
            volume.data().mapv(|v| to_sample(rescale.to_value(f64::from(v))))
        };

        // Volume data is [z, y, x]; NIfTI's first axis is x.
        WriterOptions::new(path)
            .reference_header(&Self::header(volume))
            .write_nifti(&values.view().reversed_axes())
            .map_err(|e| ResampleError::output(path, e))?;

        info!(path = ?path, size = ?volume.size(), "Volume exported");
        Ok(())
    }
}
