//
// metadata.rs
// Dicom-Resample-rs
//
// Derives the per-slice attribute sets of the resampled series from the input series.
//
// Thales Matheus Mendonça Santos - November 2025

use chrono::{Local, NaiveDateTime};
use dicom::core::value::{DataSetSequence, Value};
use dicom::core::{DataElement, Length, Tag, VR};
use dicom::dictionary_std::tags;
use dicom::object::InMemDicomObject;
use tracing::debug;

use crate::dicom_access::{
    ds_element, format_ds, is_element, is_private, multi_str_element, str_element, ElementAccess,
};
use crate::error::{ResampleError, Result};
use crate::rescale::RescaleParameters;
use crate::uid;
use crate::volume::{dot, Volume};

/// Series number reserved for derived (resampled) series.
pub const DERIVED_SERIES_NUMBER: i32 = 1001;

const MAX_LO_LENGTH: usize = 64;

// Attributes describing the old grid or old pixel data; the writer and this module
// set the replacements.
const STALE_TAGS: [Tag; 5] = [
    tags::PIXEL_DATA,
    tags::SMALLEST_IMAGE_PIXEL_VALUE,
    tags::LARGEST_IMAGE_PIXEL_VALUE,
    tags::SMALLEST_PIXEL_VALUE_IN_SERIES,
    tags::LARGEST_PIXEL_VALUE_IN_SERIES,
];

/// Attributes of one output slice.
#[derive(Debug, Clone)]
pub struct SliceMetadata {
    pub instance_number: u32,
    pub image_position: [f64; 3],
    pub series_number: i32,
    pub series_instance_uid: String,
    pub sop_instance_uid: String,
    /// Complete dataset (without pixel data) handed to the writer.
    pub attributes: InMemDicomObject,
}

/// Builds the attribute sets of a derived series from the input slice datasets.
pub struct MetadataPropagator<'a> {
    source: &'a [InMemDicomObject],
    series_instance_uid: String,
    rescale: RescaleParameters,
    created: NaiveDateTime,
}

impl<'a> MetadataPropagator<'a> {
    /// `source` holds the input slice datasets in volume z order.
    pub fn new(source: &'a [InMemDicomObject]) -> Self {
        let input_uid = source
            .first()
            .and_then(|s| s.element_str(tags::SERIES_INSTANCE_UID));
        Self {
            source,
            series_instance_uid: uid::generate_uid_distinct_from(input_uid.as_deref()),
            rescale: RescaleParameters::IDENTITY,
            created: Local::now().naive_local(),
        }
    }

    /// Slope/intercept to declare in the output; must match the written pixels.
    pub fn with_rescale(mut self, rescale: RescaleParameters) -> Self {
        self.rescale = rescale;
        self
    }

    pub fn with_creation_time(mut self, created: NaiveDateTime) -> Self {
        self.created = created;
        self
    }

    pub fn series_instance_uid(&self) -> &str {
        &self.series_instance_uid
    }

    /// One metadata entry per z-slice of `volume`.
    pub fn propagate(&self, volume: &Volume) -> Result<Vec<SliceMetadata>> {
        if self.source.is_empty() {
            return Err(ResampleError::MissingSeriesMetadata);
        }
        let [_, _, depth] = volume.size();
        debug!(
            input_slices = self.source.len(),
            output_slices = depth,
            series_instance_uid = %self.series_instance_uid,
            "Propagating slice metadata"
        );
        Ok((0..depth).map(|k| self.slice_metadata(volume, k)).collect())
    }

    /// ImagePositionPatient of output slice `k`.
    pub fn image_position(volume: &Volume, k: usize) -> [f64; 3] {
        let origin = volume.origin();
        let normal = volume.slice_normal();
        let offset = k as f64 * volume.spacing()[2];
        [
            normal[0].mul_add(offset, origin[0]),
            normal[1].mul_add(offset, origin[1]),
            normal[2].mul_add(offset, origin[2]),
        ]
    }

    fn slice_metadata(&self, volume: &Volume, k: usize) -> SliceMetadata {
        // Nothing but position varies along z, so the nearest input slice is enough.
        let template = &self.source[k.min(self.source.len() - 1)];
        let mut attributes = non_private_copy(template);
        for tag in STALE_TAGS {
            attributes.remove_element(tag);
        }

        let [sx, sy, sz] = volume.spacing();
        let position = Self::image_position(volume, k);
        let row = volume.axis_direction(0);
        let column = volume.axis_direction(1);
        let instance_number = k as u32 + 1;
        let sop_instance_uid = uid::generate_uid();

        // Identity of the derived series and instance.
        attributes.put(str_element(
            tags::SERIES_INSTANCE_UID,
            VR::UI,
            &self.series_instance_uid,
        ));
        attributes.put(str_element(tags::SOP_INSTANCE_UID, VR::UI, &sop_instance_uid));
        attributes.put(is_element(tags::SERIES_NUMBER, i64::from(DERIVED_SERIES_NUMBER)));
        attributes.put(is_element(tags::INSTANCE_NUMBER, i64::from(instance_number)));
        attributes.put(multi_str_element(tags::IMAGE_TYPE, VR::CS, &["DERIVED", "SECONDARY"]));
        attributes.put(str_element(
            tags::SERIES_DESCRIPTION,
            VR::LO,
            &self.series_description(template),
        ));
        attributes.put(str_element(
            tags::DERIVATION_DESCRIPTION,
            VR::ST,
            &format!(
                "Resampled to {} x {} x {} mm spacing",
                format_ds(sx),
                format_ds(sy),
                format_ds(sz)
            ),
        ));
        attributes.put(str_element(
            tags::INSTANCE_CREATION_DATE,
            VR::DA,
            &self.created.format("%Y%m%d").to_string(),
        ));
        attributes.put(str_element(
            tags::INSTANCE_CREATION_TIME,
            VR::TM,
            &self.created.format("%H%M%S").to_string(),
        ));

        // Geometry of the new grid.
        attributes.put(ds_element(tags::IMAGE_POSITION_PATIENT, &position));
        attributes.put(ds_element(
            tags::IMAGE_ORIENTATION_PATIENT,
            &[row[0], row[1], row[2], column[0], column[1], column[2]],
        ));
        attributes.put(ds_element(
            tags::SLICE_LOCATION,
            &[dot(position, volume.slice_normal())],
        ));
        // PixelSpacing is row spacing (y) first, then column spacing (x).
        attributes.put(ds_element(tags::PIXEL_SPACING, &[sy, sx]));
        attributes.put(ds_element(tags::SLICE_THICKNESS, &[sz]));
        attributes.put(ds_element(tags::SPACING_BETWEEN_SLICES, &[sz]));

        attributes.put(ds_element(tags::RESCALE_SLOPE, &[self.rescale.slope]));
        attributes.put(ds_element(tags::RESCALE_INTERCEPT, &[self.rescale.intercept]));

        SliceMetadata {
            instance_number,
            image_position: position,
            series_number: DERIVED_SERIES_NUMBER,
            series_instance_uid: self.series_instance_uid.clone(),
            sop_instance_uid,
            attributes,
        }
    }

    fn series_description(&self, template: &InMemDicomObject) -> String {
        let description = match template.element_str(tags::SERIES_DESCRIPTION) {
            Some(d) if !d.trim().is_empty() => format!("{} resampled", d.trim()),
            _ => "Resampled".to_string(),
        };
        description.chars().take(MAX_LO_LENGTH).collect()
    }
}

/// Copy of `obj` without private attributes, file meta group or group length elements.
/// Sequence items are cleaned the same way.
fn non_private_copy(obj: &InMemDicomObject) -> InMemDicomObject {
    let mut copy = InMemDicomObject::new_empty();
    for elem in obj.iter() {
        let tag = elem.header().tag;
        if is_private(tag) || tag.group() == 0x0002 || tag.element() == 0x0000 {
            continue;
        }
        match elem.value() {
            Value::Sequence(seq) => {
                let items: Vec<InMemDicomObject> = seq.items().iter().map(non_private_copy).collect();
                copy.put(DataElement::new(
                    tag,
                    elem.vr(),
                    DataSetSequence::new(items, Length::UNDEFINED),
                ));
            }
            _ => {
                copy.put(elem.clone());
            }
        }
    }
    copy
}
