//
// lib.rs
// Dicom-Resample-rs
//
// Exposes the resampling pipeline stages and re-exports the CLI entry point for both binary and library consumers.
//
// Thales Matheus Mendonça Santos - November 2025

// Public surface of the library: one module per pipeline stage plus shared utilities.
pub mod cli;
pub mod dicom_access;
pub mod error;
pub mod export;
mod interpolate;
pub mod metadata;
pub mod models;
pub mod pipeline;
pub mod reader;
pub mod resample;
pub mod rescale;
pub mod series;
pub mod stats;
pub mod uid;
pub mod volume;
pub mod writer;

pub use cli::{run as run_cli, run_with, Cli};
pub use error::{ResampleError, Result};
pub use export::{NiftiExporter, VolumeExporter};
pub use metadata::{MetadataPropagator, SliceMetadata, DERIVED_SERIES_NUMBER};
pub use pipeline::{PipelineConfig, ResampledSeries};
pub use reader::{DirectoryReader, LoadedSeries, PixelValues, SeriesReader};
pub use resample::{resample, ResampleRequest, Resampler};
pub use rescale::{RescaleNormalizer, RescaleParameters};
pub use series::{assemble, SeriesSlice};
pub use volume::Volume;
pub use writer::{DirectoryWriter, SeriesWriter, UncompressedTransferSyntax};
