//
// pipeline.rs
// Dicom-Resample-rs
//
// Runs read -> resample -> metadata -> rescale -> assemble -> write with explicit reader/writer capabilities.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;
use crate::export::VolumeExporter;
use crate::metadata::{MetadataPropagator, SliceMetadata, DERIVED_SERIES_NUMBER};
use crate::models::{ResampleReport, VolumeSummary};
use crate::reader::{LoadedSeries, SeriesReader};
use crate::resample::{ResampleRequest, Resampler};
use crate::rescale::{RescaleNormalizer, RescaleParameters};
use crate::series::{self, SeriesSlice};
use crate::stats::volume_summary;
use crate::volume::Volume;
use crate::writer::SeriesWriter;

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineConfig {
    pub request: ResampleRequest,
    /// Set when the reader hands over rescaled values instead of stored ones.
    pub decoder_applies_rescale: bool,
}

/// Output volume (stored values) and the metadata of every output slice.
#[derive(Debug, Clone)]
pub struct ResampledSeries {
    pub volume: Volume,
    pub metadata: Vec<SliceMetadata>,
    pub series_instance_uid: String,
    pub rescale: RescaleParameters,
    pub rescale_undone: bool,
    /// Summary taken before the rescale undo, in the same units as the input.
    pub summary: VolumeSummary,
}

impl ResampledSeries {
    pub fn slices(&self) -> Result<Vec<SeriesSlice<'_>>> {
        series::assemble(&self.volume, &self.metadata)
    }
}

/// Pure part of the pipeline: nothing here touches the filesystem.
pub fn process(series: &LoadedSeries, config: &PipelineConfig) -> Result<ResampledSeries> {
    let resampled = Resampler::new(config.request).resample(&series.volume)?;

    // The written slope/intercept is the input's either way: values are stored ones
    // already, or become stored ones again in the normalizer below.
    let rescale = RescaleParameters::from_series(&series.slices);
    let propagator = MetadataPropagator::new(&series.slices).with_rescale(rescale);
    let metadata = propagator.propagate(&resampled)?;

    let summary = volume_summary(&resampled);
    let normalizer = RescaleNormalizer::new(rescale, config.decoder_applies_rescale);
    let volume = normalizer.normalize(resampled)?;

    Ok(ResampledSeries {
        volume,
        metadata,
        series_instance_uid: propagator.series_instance_uid().to_string(),
        rescale,
        rescale_undone: normalizer.is_active(),
        summary,
    })
}

/// Reads `input`, resamples it to `request` and writes the derived series to `output`.
/// Nothing is written unless every stage before the writer succeeded.
pub fn run(
    reader: &dyn SeriesReader,
    writer: &dyn SeriesWriter,
    input: &Path,
    output: &Path,
    request: ResampleRequest,
) -> Result<ResampleReport> {
    execute(reader, writer, None, input, output, request)
}

/// Same as [`run`], and also exports the whole output volume to `volume_output`.
pub fn run_with_export(
    reader: &dyn SeriesReader,
    writer: &dyn SeriesWriter,
    exporter: &dyn VolumeExporter,
    input: &Path,
    output: &Path,
    volume_output: &Path,
    request: ResampleRequest,
) -> Result<ResampleReport> {
    execute(reader, writer, Some((exporter, volume_output)), input, output, request)
}

fn execute(
    reader: &dyn SeriesReader,
    writer: &dyn SeriesWriter,
    export: Option<(&dyn VolumeExporter, &Path)>,
    input: &Path,
    output: &Path,
    request: ResampleRequest,
) -> Result<ResampleReport> {
    let loaded = reader.read(input)?;
    let config = PipelineConfig {
        request,
        decoder_applies_rescale: reader.applies_rescale(),
    };

    let resampled = process(&loaded, &config)?;
    let slices = resampled.slices()?;

    if let Some((exporter, path)) = export {
        exporter.export(path, &resampled.volume, resampled.rescale)?;
    }
    let files = match writer.write(output, &slices) {
        Ok(files) => files,
        Err(e) => {
            if let Some((_, path)) = export {
                if let Err(remove) = fs::remove_file(path) {
                    warn!(path = ?path, error = %remove, "Could not remove exported volume");
                }
            }
            return Err(e);
        }
    };

    info!(
        slices = files.len(),
        series_instance_uid = %resampled.series_instance_uid,
        "Resampled series complete"
    );

    Ok(ResampleReport {
        input: volume_summary(&loaded.volume),
        output: resampled.summary.clone(),
        input_series_instance_uid: loaded.series_instance_uid(),
        series_instance_uid: resampled.series_instance_uid.clone(),
        series_number: DERIVED_SERIES_NUMBER,
        rescale: resampled.rescale,
        rescale_undone: resampled.rescale_undone,
        files,
        volume_file: export.map(|(_, path)| path.to_path_buf()),
    })
}
