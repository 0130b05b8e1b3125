//
// metadata.rs
// Dicom-Resample-rs
//
// Per-slice metadata of the derived series: positions, identity, copied and dropped attributes.
//
// Thales Matheus Mendonça Santos - November 2025

use std::collections::HashSet;

use approx::assert_abs_diff_eq;
use dicom::core::value::DataSetSequence;
use dicom::core::{DataElement, Length, PrimitiveValue, Tag, VR};
use dicom::dictionary_std::tags;
use dicom::object::InMemDicomObject;
use dicom_resample::dicom_access::{format_ds, ElementAccess};
use dicom_resample::{
    MetadataPropagator, RescaleParameters, ResampleError, Volume, DERIVED_SERIES_NUMBER,
};
use ndarray::Array3;

const INPUT_SERIES_UID: &str = "1.2.826.0.1.3680043.2.1125.77";
const PRIVATE_TAG: Tag = Tag(0x0009, 0x1001);

fn input_slices(count: usize) -> Vec<InMemDicomObject> {
    (0..count)
        .map(|i| {
            let mut obj = InMemDicomObject::new_empty();
            obj.put(DataElement::new(
                tags::PATIENT_NAME,
                VR::PN,
                PrimitiveValue::from("Test^Patient"),
            ));
            obj.put(DataElement::new(
                tags::STUDY_INSTANCE_UID,
                VR::UI,
                PrimitiveValue::from("1.2.826.0.1.3680043.2.1125.5"),
            ));
            obj.put(DataElement::new(
                tags::SERIES_INSTANCE_UID,
                VR::UI,
                PrimitiveValue::from(INPUT_SERIES_UID),
            ));
            obj.put(DataElement::new(
                tags::SERIES_NUMBER,
                VR::IS,
                PrimitiveValue::from("5"),
            ));
            obj.put(DataElement::new(
                tags::SERIES_DESCRIPTION,
                VR::LO,
                PrimitiveValue::from("Chest CT"),
            ));
            obj.put(DataElement::new(
                tags::IMAGE_COMMENTS,
                VR::LT,
                PrimitiveValue::from(format!("slice {}", i)),
            ));
            obj.put(DataElement::new(
                tags::SMALLEST_IMAGE_PIXEL_VALUE,
                VR::SS,
                PrimitiveValue::from(-1024_i16),
            ));
            obj.put(DataElement::new(
                PRIVATE_TAG,
                VR::LO,
                PrimitiveValue::from("VENDOR SECRET"),
            ));
            obj
        })
        .collect()
}

fn output_volume(depth: usize, origin: [f64; 3]) -> Volume {
    Volume::new(
        Array3::zeros((depth, 4, 3)),
        [0.7, 0.6, 1.25],
        origin,
        dicom_resample::volume::IDENTITY_DIRECTION,
    )
    .expect("volume")
}

#[test]
fn positions_follow_the_new_z_spacing() {
    let source = input_slices(4);
    let volume = output_volume(8, [10.0, -20.0, 30.0]);

    let metadata = MetadataPropagator::new(&source)
        .propagate(&volume)
        .expect("metadata");

    assert_eq!(metadata.len(), 8);
    for (k, slice) in metadata.iter().enumerate() {
        assert_abs_diff_eq!(slice.image_position[0], 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(slice.image_position[1], -20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(slice.image_position[2], 30.0 + k as f64 * 1.25, epsilon = 1e-6);

        let written = slice
            .attributes
            .element_vec3(tags::IMAGE_POSITION_PATIENT)
            .expect("position element");
        assert_abs_diff_eq!(written[2], slice.image_position[2], epsilon = 1e-6);
    }
    for pair in metadata.windows(2) {
        assert!(pair[1].instance_number > pair[0].instance_number);
        assert_abs_diff_eq!(
            pair[1].image_position[2] - pair[0].image_position[2],
            1.25,
            epsilon = 1e-6
        );
    }
    assert_eq!(metadata[0].instance_number, 1);
}

#[test]
fn oblique_positions_move_along_the_slice_normal() {
    let s = std::f64::consts::FRAC_1_SQRT_2;
    let direction = [[1.0, 0.0, 0.0], [0.0, s, -s], [0.0, s, s]];
    let volume = Volume::new(Array3::zeros((3, 2, 2)), [1.0, 1.0, 2.0], [0.0, 5.0, 5.0], direction)
        .expect("volume");
    let source = input_slices(3);

    let metadata = MetadataPropagator::new(&source).propagate(&volume).expect("metadata");

    let last = metadata[2].image_position;
    assert_abs_diff_eq!(last[0], 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(last[1], 5.0 - 4.0 * s, epsilon = 1e-9);
    assert_abs_diff_eq!(last[2], 5.0 + 4.0 * s, epsilon = 1e-9);

    let orientation = metadata[0]
        .attributes
        .element_floats(tags::IMAGE_ORIENTATION_PATIENT)
        .expect("orientation");
    assert_eq!(orientation.len(), 6);
    assert_abs_diff_eq!(orientation[4], s, epsilon = 1e-6);
}

#[test]
fn derived_series_gets_new_identity() {
    let source = input_slices(3);
    let volume = output_volume(5, [0.0; 3]);

    let propagator = MetadataPropagator::new(&source);
    let metadata = propagator.propagate(&volume).expect("metadata");

    assert_ne!(propagator.series_instance_uid(), INPUT_SERIES_UID);
    assert!(propagator.series_instance_uid().starts_with("2.25."));

    let mut sop_uids = HashSet::new();
    for slice in &metadata {
        assert_eq!(slice.series_number, DERIVED_SERIES_NUMBER);
        assert_eq!(slice.attributes.element_int(tags::SERIES_NUMBER), Some(1001));
        assert_eq!(slice.series_instance_uid, propagator.series_instance_uid());
        assert_eq!(
            slice.attributes.element_str(tags::SERIES_INSTANCE_UID).as_deref(),
            Some(propagator.series_instance_uid())
        );
        assert!(sop_uids.insert(slice.sop_instance_uid.clone()));
        assert_eq!(
            slice.attributes.element_str(tags::IMAGE_TYPE).as_deref(),
            Some("DERIVED\\SECONDARY")
        );
    }
}

#[test]
fn descriptive_attributes_are_copied_and_private_ones_dropped() {
    let source = input_slices(3);
    let volume = output_volume(6, [0.0; 3]);

    let metadata = MetadataPropagator::new(&source).propagate(&volume).expect("metadata");

    for (k, slice) in metadata.iter().enumerate() {
        let attrs = &slice.attributes;
        assert_eq!(attrs.element_str(tags::PATIENT_NAME).as_deref(), Some("Test^Patient"));
        assert!(!attrs.has_element(PRIVATE_TAG));
        assert!(!attrs.has_element(tags::SMALLEST_IMAGE_PIXEL_VALUE));
        // Extra output slices copy from the last input slice.
        let expected = format!("slice {}", k.min(2));
        assert_eq!(attrs.element_str(tags::IMAGE_COMMENTS), Some(expected));
        assert_eq!(
            attrs.element_str(tags::SERIES_DESCRIPTION).as_deref(),
            Some("Chest CT resampled")
        );
    }
}

#[test]
fn private_attributes_inside_sequences_are_dropped() {
    let mut item = InMemDicomObject::new_empty();
    item.put(DataElement::new(
        tags::REFERENCED_SOP_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from("1.2.826.0.1.3680043.2.1125.5.1"),
    ));
    item.put(DataElement::new(
        PRIVATE_TAG,
        VR::LO,
        PrimitiveValue::from("NESTED SECRET"),
    ));
    let mut source = input_slices(1);
    source[0].put(DataElement::new(
        tags::REFERENCED_IMAGE_SEQUENCE,
        VR::SQ,
        DataSetSequence::new(vec![item], Length::UNDEFINED),
    ));
    let volume = output_volume(2, [0.0; 3]);

    let metadata = MetadataPropagator::new(&source).propagate(&volume).expect("metadata");

    let items = metadata[1]
        .attributes
        .element(tags::REFERENCED_IMAGE_SEQUENCE)
        .expect("sequence kept")
        .items()
        .expect("sequence items");
    assert_eq!(items.len(), 1);
    assert!(!items[0].has_element(PRIVATE_TAG));
    assert_eq!(
        items[0].element_str(tags::REFERENCED_SOP_INSTANCE_UID).as_deref(),
        Some("1.2.826.0.1.3680043.2.1125.5.1")
    );
}

#[test]
fn spacing_and_rescale_attributes_describe_the_new_grid() {
    let source = input_slices(2);
    let volume = output_volume(2, [0.0; 3]);

    let metadata = MetadataPropagator::new(&source)
        .with_rescale(RescaleParameters::new(2.0, -1024.0))
        .propagate(&volume)
        .expect("metadata");

    let attrs = &metadata[0].attributes;
    // Row spacing (y) comes first.
    assert_eq!(attrs.element_floats(tags::PIXEL_SPACING), Some(vec![0.6, 0.7]));
    assert_eq!(attrs.element_float(tags::SLICE_THICKNESS), Some(1.25));
    assert_eq!(attrs.element_float(tags::SPACING_BETWEEN_SLICES), Some(1.25));
    assert_eq!(attrs.element_float(tags::RESCALE_SLOPE), Some(2.0));
    assert_eq!(attrs.element_float(tags::RESCALE_INTERCEPT), Some(-1024.0));
}

#[test]
fn missing_input_metadata_is_an_error() {
    let volume = output_volume(2, [0.0; 3]);
    let err = MetadataPropagator::new(&[]).propagate(&volume).expect_err("no metadata");
    assert!(matches!(err, ResampleError::MissingSeriesMetadata));
}

#[test]
fn decimal_strings_stay_within_sixteen_characters() {
    for value in [0.0, 1.25, -1024.0, 123456.789012345, -0.000000123, 1e20, 0.1 + 0.2] {
        let text = format_ds(value);
        assert!(text.len() <= 16, "{} -> {}", value, text);
        let parsed: f64 = text.parse().expect("parse");
        assert!((parsed - value).abs() <= value.abs() * 1e-6 + 1e-6, "{} -> {}", value, text);
    }
    assert_eq!(format_ds(1.25), "1.25");
    assert_eq!(format_ds(-1024.0), "-1024");
}
