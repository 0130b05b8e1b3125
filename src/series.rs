//
// series.rs
// Dicom-Resample-rs
//
// Pairs each z-slice of the output volume with its metadata, ready for the writer.
//
// Thales Matheus Mendonça Santos - November 2025

use ndarray::{ArrayView2, Axis};

use crate::error::{ResampleError, Result};
use crate::metadata::SliceMetadata;
use crate::volume::Volume;

/// One output slice: `(rows, columns)` pixels plus the attributes to write with them.
#[derive(Debug, Clone)]
pub struct SeriesSlice<'a> {
    pub index: usize,
    pub pixels: ArrayView2<'a, i16>,
    pub metadata: &'a SliceMetadata,
}

pub fn assemble<'a>(volume: &'a Volume, metadata: &'a [SliceMetadata]) -> Result<Vec<SeriesSlice<'a>>> {
    let volume_slices = volume.dim().0;
    if volume_slices != metadata.len() {
        return Err(ResampleError::SliceCountMismatch {
            volume_slices,
            metadata_slices: metadata.len(),
        });
    }

    Ok(volume
        .data()
        .axis_iter(Axis(0))
        .zip(metadata.iter())
        .enumerate()
        .map(|(index, (pixels, metadata))| SeriesSlice {
            index,
            pixels,
            metadata,
        })
        .collect())
}
