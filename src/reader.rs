//
// reader.rs
// Dicom-Resample-rs
//
// Reads one DICOM series from a directory into a volume plus its per-slice datasets.
//
// Thales Matheus Mendonça Santos - November 2025

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use dicom::dictionary_std::tags;
use dicom::object::{open_file, DefaultDicomObject, InMemDicomObject};
use dicom::pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder, VoiLutOption};
use ndarray::{s, Array2, Array3};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::dicom_access::ElementAccess;
use crate::error::{ResampleError, Result};
use crate::interpolate::to_sample;
use crate::rescale::RescaleParameters;
use crate::volume::{direction_from_orientation, dot, Direction, Volume, IDENTITY_DIRECTION};

// Relative deviation between slice gaps tolerated before warning.
const GAP_TOLERANCE: f64 = 0.01;

/// A decoded series: the volume and the input datasets in volume z order.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub volume: Volume,
    pub slices: Vec<InMemDicomObject>,
    pub files: Vec<PathBuf>,
}

impl LoadedSeries {
    pub fn series_instance_uid(&self) -> Option<String> {
        self.slices
            .first()
            .and_then(|s| s.element_str(tags::SERIES_INSTANCE_UID))
    }
}

/// Source of an input series.
pub trait SeriesReader {
    fn read(&self, directory: &Path) -> Result<LoadedSeries>;

    /// Whether the decoded values already have RescaleSlope/Intercept applied.
    fn applies_rescale(&self) -> bool;
}

/// Which pixel values the decoder hands to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelValues {
    /// Modality LUT applied (stored * slope + intercept).
    #[default]
    Rescaled,
    /// Raw stored values.
    Stored,
}

/// Reads the top level of a directory with dicom-rs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryReader {
    pixel_values: PixelValues,
}

struct SliceRecord {
    path: PathBuf,
    object: DefaultDicomObject,
    pixels: Array2<i16>,
    series_uid: String,
    position: Option<[f64; 3]>,
    instance_number: Option<i32>,
}

impl DirectoryReader {
    pub fn new(pixel_values: PixelValues) -> Self {
        Self { pixel_values }
    }

    pub fn pixel_values(&self) -> PixelValues {
        self.pixel_values
    }

    fn list_files(directory: &Path) -> Result<Vec<PathBuf>> {
        if !directory.is_dir() {
            return Err(ResampleError::input(directory, "not a directory"));
        }
        let files: Vec<PathBuf> = WalkDir::new(directory)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        Ok(files)
    }

    /// Opens one file. Files that are not DICOM are skipped; a DICOM file whose pixel
    /// data cannot be decoded fails the whole read.
    fn load_record(&self, path: PathBuf) -> Result<Option<SliceRecord>> {
        let object = match open_file(&path) {
            Ok(object) => object,
            Err(e) => {
                debug!(path = ?path, error = %e, "Skipping non-DICOM file");
                return Ok(None);
            }
        };
        let stored =
            decode_first_frame(&object).map_err(|reason| ResampleError::input(&path, reason))?;
        let params = match self.pixel_values {
            PixelValues::Stored => RescaleParameters::IDENTITY,
            PixelValues::Rescaled => RescaleParameters::from_dataset(&object),
        };
        let pixels = to_samples(&path, &stored, params);

        Ok(Some(SliceRecord {
            series_uid: object
                .element_str(tags::SERIES_INSTANCE_UID)
                .unwrap_or_default(),
            position: object.element_vec3(tags::IMAGE_POSITION_PATIENT),
            instance_number: object.element_int(tags::INSTANCE_NUMBER),
            path,
            object,
            pixels,
        }))
    }
}

impl SeriesReader for DirectoryReader {
    fn read(&self, directory: &Path) -> Result<LoadedSeries> {
        let files = Self::list_files(directory)?;
        info!(directory = ?directory, files = files.len(), "Reading DICOM series");

        let records: Vec<Option<SliceRecord>> = files
            .into_par_iter()
            .map(|path| self.load_record(path))
            .collect::<Result<_>>()?;
        let records: Vec<SliceRecord> = records.into_iter().flatten().collect();

        let mut records = select_series(records)
            .ok_or_else(|| ResampleError::input(directory, "no DICOM images found"))?;

        let direction = series_direction(&records[0].object);
        sort_records(&mut records, &direction);
        let spacing = series_spacing(&records, &direction);
        let origin = records[0].position.unwrap_or([0.0; 3]);

        let data = build_volume_array(&records).map_err(|reason| ResampleError::input(directory, reason))?;
        let volume = Volume::new(data, spacing, origin, direction)
            .map_err(|e| ResampleError::input(directory, e))?;

        info!(
            size = ?volume.size(),
            spacing = ?volume.spacing(),
            origin = ?volume.origin(),
            "Series loaded"
        );

        let (files, slices): (Vec<PathBuf>, Vec<InMemDicomObject>) = records
            .into_iter()
            .map(|r| (r.path, r.object.into_inner()))
            .unzip();

        Ok(LoadedSeries {
            volume,
            slices,
            files,
        })
    }

    fn applies_rescale(&self) -> bool {
        self.pixel_values == PixelValues::Rescaled
    }
}

/// Stored values of the first frame, first sample. Decoded as `f64` so unsigned
/// 16-bit data above `i16::MAX` survives until it is saturated explicitly.
fn decode_first_frame(object: &DefaultDicomObject) -> std::result::Result<Array2<f64>, String> {
    let options = ConvertOptions::new()
        .with_modality_lut(ModalityLutOption::None)
        .with_voi_lut(VoiLutOption::Identity);
    let decoded = object.decode_pixel_data().map_err(|e| e.to_string())?;
    let frames = decoded
        .to_ndarray_with_options::<f64>(&options)
        .map_err(|e| e.to_string())?;
    // (frames, rows, columns, samples)
    Ok(frames.slice_move(s![0, .., .., 0]))
}

/// Applies `params` to stored values and saturates to the signed 16-bit sample range.
fn to_samples(path: &Path, stored: &Array2<f64>, params: RescaleParameters) -> Array2<i16> {
    let mut clipped = 0usize;
    let samples = stored.mapv(|v| {
        let value = params.to_value(v).round();
        if value < f64::from(i16::MIN) || value > f64::from(i16::MAX) {
            clipped += 1;
        }
        to_sample(value)
    });
    if clipped > 0 {
        warn!(path = ?path, clipped, "Pixel values outside the signed 16-bit range were saturated");
    }
    samples
}

/// Keeps the series whose Series Instance UID sorts first.
fn select_series(records: Vec<SliceRecord>) -> Option<Vec<SliceRecord>> {
    let mut by_series: BTreeMap<String, Vec<SliceRecord>> = BTreeMap::new();
    for record in records {
        by_series
            .entry(record.series_uid.clone())
            .or_default()
            .push(record);
    }
    if by_series.len() > 1 {
        warn!(
            series = by_series.len(),
            "Directory holds several series; using the first one"
        );
    }
    by_series.into_iter().next().map(|(_, records)| records)
}

fn series_direction(first: &DefaultDicomObject) -> Direction {
    first
        .element_floats(tags::IMAGE_ORIENTATION_PATIENT)
        .filter(|v| v.len() == 6)
        .and_then(|v| direction_from_orientation([v[0], v[1], v[2]], [v[3], v[4], v[5]]))
        .unwrap_or_else(|| {
            warn!("Missing or invalid ImageOrientationPatient; assuming axial identity");
            IDENTITY_DIRECTION
        })
}

fn normal_of(direction: &Direction) -> [f64; 3] {
    [direction[0][2], direction[1][2], direction[2][2]]
}

/// Orders slices along the slice normal, falling back to InstanceNumber.
fn sort_records(records: &mut [SliceRecord], direction: &Direction) {
    let normal = normal_of(direction);
    if records.iter().all(|r| r.position.is_some()) {
        records.sort_by(|a, b| {
            let da = a.position.map_or(0.0, |p| dot(p, normal));
            let db = b.position.map_or(0.0, |p| dot(p, normal));
            da.partial_cmp(&db).unwrap_or(Ordering::Equal)
        });
    } else {
        debug!("ImagePositionPatient missing on some slices; sorting by InstanceNumber");
        records.sort_by_key(|r| r.instance_number.unwrap_or(i32::MAX));
    }
}

fn series_spacing(records: &[SliceRecord], direction: &Direction) -> [f64; 3] {
    let first = &records[0].object;
    let (sx, sy) = match first.element_floats(tags::PIXEL_SPACING).as_deref() {
        // PixelSpacing is row spacing (y) first, then column spacing (x).
        Some([row, column, ..]) if *row > 0.0 && *column > 0.0 => (*column, *row),
        _ => {
            warn!("Missing PixelSpacing; assuming 1 mm");
            (1.0, 1.0)
        }
    };

    let normal = normal_of(direction);
    let gaps: Vec<f64> = records
        .windows(2)
        .filter_map(|pair| match (pair[0].position, pair[1].position) {
            (Some(a), Some(b)) => Some((dot(b, normal) - dot(a, normal)).abs()),
            _ => None,
        })
        .collect();

    let sz = match gaps.first() {
        Some(&gap) if gap > 1e-6 => {
            if gaps.iter().any(|g| (g - gap).abs() > gap * GAP_TOLERANCE) {
                warn!(gap, "Slice positions are not evenly spaced; using the first gap");
            }
            gap
        }
        _ => [tags::SPACING_BETWEEN_SLICES, tags::SLICE_THICKNESS]
            .iter()
            .filter_map(|&tag| first.element_float(tag))
            .find(|&v| v > 0.0)
            .unwrap_or(1.0),
    };

    [sx, sy, sz]
}

fn build_volume_array(records: &[SliceRecord]) -> std::result::Result<Array3<i16>, String> {
    let (height, width) = records[0].pixels.dim();
    if let Some(odd) = records.iter().find(|r| r.pixels.dim() != (height, width)) {
        return Err(format!(
            "inconsistent slice dimensions: {:?} is {:?}, expected {:?}",
            odd.path,
            odd.pixels.dim(),
            (height, width)
        ));
    }

    let mut volume = Array3::<i16>::zeros((records.len(), height, width));
    for (i, record) in records.iter().enumerate() {
        volume.slice_mut(s![i, .., ..]).assign(&record.pixels);
    }
    Ok(volume)
}
