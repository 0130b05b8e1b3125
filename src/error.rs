//
// error.rs
// Dicom-Resample-rs
//
// Error taxonomy shared by every stage of the resampling pipeline.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResampleError>;

/// Every failure aborts the run; nothing here is retried.
#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("could not read DICOM series from {path:?}: {reason}")]
    InputReadFailure { path: PathBuf, reason: String },

    #[error("invalid spacing {spacing:?}: each axis must be finite and non-negative (0 keeps the input spacing)")]
    InvalidSpacing { spacing: [f64; 3] },

    #[error("volume is empty (x, y, z = {size:?})")]
    EmptyVolume { size: [usize; 3] },

    #[error("input series carries no slice metadata")]
    MissingSeriesMetadata,

    #[error("invalid rescale parameters: slope {slope}, intercept {intercept}")]
    InvalidRescaleParameters { slope: f64, intercept: f64 },

    #[error("volume has {volume_slices} slices but {metadata_slices} metadata entries were derived")]
    SliceCountMismatch {
        volume_slices: usize,
        metadata_slices: usize,
    },

    #[error("could not write DICOM series to {path:?}: {reason}")]
    OutputWriteFailure { path: PathBuf, reason: String },

    #[error("invalid volume geometry: {0}")]
    InvalidGeometry(String),
}

impl ResampleError {
    /// Name of the pipeline stage that raised the error, used in CLI messages.
    pub fn stage(&self) -> &'static str {
        match self {
            ResampleError::InputReadFailure { .. } => "read",
            ResampleError::InvalidSpacing { .. } | ResampleError::EmptyVolume { .. } => "resample",
            ResampleError::MissingSeriesMetadata => "metadata",
            ResampleError::InvalidRescaleParameters { .. } => "rescale",
            ResampleError::SliceCountMismatch { .. } => "assemble",
            ResampleError::OutputWriteFailure { .. } => "write",
            ResampleError::InvalidGeometry(_) => "volume",
        }
    }

    pub(crate) fn input(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ResampleError::InputReadFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn output(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ResampleError::OutputWriteFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
