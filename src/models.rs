//
// models.rs
// Dicom-Resample-rs
//
// Defines serializable data structures describing volumes and the outcome of a resampling run.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::rescale::RescaleParameters;

/// Aggregate statistics over voxel values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntensitySummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub total_voxels: usize,
}

/// Grid and intensity overview of one volume, axes in (x, y, z) order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSummary {
    pub size: [usize; 3],
    pub spacing: [f64; 3],
    pub origin: [f64; 3],
    pub intensity: IntensitySummary,
}

/// Everything a caller needs to know about a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResampleReport {
    pub input: VolumeSummary,
    pub output: VolumeSummary,
    pub input_series_instance_uid: Option<String>,
    pub series_instance_uid: String,
    pub series_number: i32,
    pub rescale: RescaleParameters,
    pub rescale_undone: bool,
    pub files: Vec<PathBuf>,
    /// Single-file copy of the output volume, when one was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_file: Option<PathBuf>,
}
