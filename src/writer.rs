//
// writer.rs
// Dicom-Resample-rs
//
// Serializes an assembled series as one uncompressed DICOM file per slice, rolling back on failure.
//
// Thales Matheus Mendonça Santos - November 2025

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::dictionary_std::{tags, StandardDataDictionary};
use dicom::object::{DefaultDicomObject, FileDicomObject, FileMetaTableBuilder};
use dicom::transfer_syntax::entries::{EXPLICIT_VR_LITTLE_ENDIAN, IMPLICIT_VR_LITTLE_ENDIAN};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::dicom_access::{str_element, us_element, ElementAccess};
use crate::error::{ResampleError, Result};
use crate::series::SeriesSlice;

/// Secondary Capture Image Storage, used when the input carried no SOP Class UID.
const SECONDARY_CAPTURE_SOP_CLASS: &str = "1.2.840.10008.5.1.4.1.1.7";

/// Supported uncompressed transfer syntaxes for the output series.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum UncompressedTransferSyntax {
    #[default]
    ExplicitVRLittleEndian,
    ImplicitVRLittleEndian,
}

impl UncompressedTransferSyntax {
    pub fn uid(self) -> &'static str {
        match self {
            UncompressedTransferSyntax::ExplicitVRLittleEndian => EXPLICIT_VR_LITTLE_ENDIAN.uid(),
            UncompressedTransferSyntax::ImplicitVRLittleEndian => IMPLICIT_VR_LITTLE_ENDIAN.uid(),
        }
    }
}

/// Destination of an assembled series.
pub trait SeriesWriter {
    /// Persists every slice, returning the written paths in slice order.
    fn write(&self, directory: &Path, slices: &[SeriesSlice<'_>]) -> Result<Vec<PathBuf>>;
}

/// Writes `IM0001.dcm`, `IM0002.dcm`, ... into a directory. Slice files left there by an
/// earlier run are removed once the new series is complete.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryWriter {
    transfer_syntax: UncompressedTransferSyntax,
}

impl DirectoryWriter {
    pub fn new(transfer_syntax: UncompressedTransferSyntax) -> Self {
        Self { transfer_syntax }
    }

    pub fn file_name(slice: &SeriesSlice<'_>) -> String {
        format!("IM{:04}.dcm", slice.metadata.instance_number)
    }

    /// Attaches the 16-bit signed pixel module and file meta to the slice attributes.
    pub fn build_file_object(&self, slice: &SeriesSlice<'_>) -> std::result::Result<DefaultDicomObject, String> {
        let mut dataset = slice.metadata.attributes.clone();
        let (rows, columns) = slice.pixels.dim();
        let rows = u16::try_from(rows).map_err(|_| format!("{} rows exceed the DICOM limit", rows))?;
        let columns =
            u16::try_from(columns).map_err(|_| format!("{} columns exceed the DICOM limit", columns))?;

        dataset.put(us_element(tags::ROWS, rows));
        dataset.put(us_element(tags::COLUMNS, columns));
        dataset.put(us_element(tags::SAMPLES_PER_PIXEL, 1));
        dataset.put(str_element(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2"));
        dataset.put(us_element(tags::BITS_ALLOCATED, 16));
        dataset.put(us_element(tags::BITS_STORED, 16));
        dataset.put(us_element(tags::HIGH_BIT, 15));
        dataset.put(us_element(tags::PIXEL_REPRESENTATION, 1));
        dataset.remove_element(tags::PLANAR_CONFIGURATION);
        dataset.remove_element(tags::NUMBER_OF_FRAMES);

        // Row-major iteration order matches the DICOM pixel layout.
        let pixel_bytes: Vec<u8> = slice.pixels.iter().flat_map(|v| v.to_le_bytes()).collect();
        dataset.put(DataElement::new(
            tags::PIXEL_DATA,
            VR::OW,
            PrimitiveValue::from(pixel_bytes),
        ));

        let sop_class_uid = dataset
            .element_str(tags::SOP_CLASS_UID)
            .filter(|uid| !uid.is_empty())
            .unwrap_or_else(|| SECONDARY_CAPTURE_SOP_CLASS.to_string());
        dataset.put(str_element(tags::SOP_CLASS_UID, VR::UI, &sop_class_uid));

        let file_meta = FileMetaTableBuilder::new()
            .transfer_syntax(self.transfer_syntax.uid())
            .media_storage_sop_class_uid(sop_class_uid.as_str())
            .media_storage_sop_instance_uid(slice.metadata.sop_instance_uid.as_str())
            .build()
            .map_err(|e| e.to_string())?;

        let mut file_obj = FileDicomObject::new_empty_with_dict_and_meta(StandardDataDictionary, file_meta);
        for elem in dataset {
            file_obj.put(elem);
        }
        Ok(file_obj)
    }
}

impl SeriesWriter for DirectoryWriter {
    fn write(&self, directory: &Path, slices: &[SeriesSlice<'_>]) -> Result<Vec<PathBuf>> {
        // Build every object up front so encoding problems surface before touching disk.
        let objects = slices
            .iter()
            .map(|slice| {
                let path = directory.join(Self::file_name(slice));
                self.build_file_object(slice)
                    .map(|obj| (path.clone(), obj))
                    .map_err(|reason| ResampleError::output(path, reason))
            })
            .collect::<Result<Vec<_>>>()?;

        fs::create_dir_all(directory).map_err(|e| ResampleError::output(directory, e))?;

        let mut written = Vec::with_capacity(objects.len());
        for (path, obj) in objects {
            if let Err(e) = obj.write_to_file(&path) {
                written.push(path.clone());
                rollback(&written);
                return Err(ResampleError::output(path, e));
            }
            debug!(path = ?path, "Wrote slice");
            written.push(path);
        }
        remove_stale_slices(directory, &written);

        info!(
            directory = ?directory,
            files = written.len(),
            transfer_syntax = self.transfer_syntax.uid(),
            "Series written"
        );
        Ok(written)
    }
}

fn rollback(written: &[PathBuf]) {
    for path in written {
        if path.exists() {
            if let Err(e) = fs::remove_file(path) {
                warn!(path = ?path, error = %e, "Could not remove partially written file");
            }
        }
    }
}

fn is_slice_file_name(name: &str) -> bool {
    name.strip_prefix("IM")
        .and_then(|rest| rest.strip_suffix(".dcm"))
        .map_or(false, |digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Deletes slice files in `directory` that are not part of `written`.
fn remove_stale_slices(directory: &Path, written: &[PathBuf]) {
    let keep: HashSet<OsString> = written
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_os_string()))
        .collect();
    let stale: Vec<PathBuf> = WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_str().map_or(false, is_slice_file_name))
        .filter(|e| !keep.contains(e.file_name()))
        .map(|e| e.into_path())
        .collect();

    for path in stale {
        match fs::remove_file(&path) {
            Ok(()) => debug!(path = ?path, "Removed slice from an earlier run"),
            Err(e) => warn!(path = ?path, error = %e, "Could not remove slice from an earlier run"),
        }
    }
}
