//
// rescale_series.rs
// Dicom-Resample-rs
//
// Rescale undo and slice/metadata assembly.
//
// Thales Matheus Mendonça Santos - November 2025

use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::dictionary_std::tags;
use dicom::object::InMemDicomObject;
use dicom_resample::rescale::undo_rescale;
use dicom_resample::{
    assemble, MetadataPropagator, RescaleNormalizer, RescaleParameters, ResampleError, Volume,
};
use ndarray::{s, Array3};

fn stored_volume() -> Array3<i16> {
    Array3::from_shape_fn((3, 2, 2), |(z, y, x)| (100 * z + 10 * y + x) as i16)
}

#[test]
fn undo_inverts_the_decoder_rescale() {
    let params = RescaleParameters::new(2.0, -1024.0);
    let stored = stored_volume();
    let rescaled = stored.mapv(|v| params.to_value(f64::from(v)) as i16);
    let volume = Volume::from_data(rescaled, [1.0, 1.0, 1.0]).expect("volume");

    let normalized = undo_rescale(volume, params).expect("undo");

    assert_eq!(normalized.data(), &stored);
}

#[test]
fn inactive_normalizer_passes_values_through() {
    let volume = Volume::from_data(stored_volume(), [1.0, 1.0, 1.0]).expect("volume");
    let normalizer = RescaleNormalizer::new(RescaleParameters::new(0.0, 5.0), false);

    let output = normalizer.normalize(volume.clone()).expect("passthrough");

    assert!(!normalizer.is_active());
    assert_eq!(output, volume);
}

#[test]
fn zero_slope_is_rejected_when_active() {
    let volume = Volume::from_data(stored_volume(), [1.0, 1.0, 1.0]).expect("volume");

    let err = undo_rescale(volume, RescaleParameters::new(0.0, -1024.0)).expect_err("slope 0");

    assert!(matches!(err, ResampleError::InvalidRescaleParameters { .. }));
    assert_eq!(err.stage(), "rescale");
}

#[test]
fn rescale_parameters_are_read_from_the_dataset() {
    let mut obj = InMemDicomObject::new_empty();
    obj.put(DataElement::new(
        tags::RESCALE_INTERCEPT,
        VR::DS,
        PrimitiveValue::from("-1024"),
    ));
    obj.put(DataElement::new(
        tags::RESCALE_SLOPE,
        VR::DS,
        PrimitiveValue::from("2"),
    ));

    assert_eq!(
        RescaleParameters::from_dataset(&obj),
        RescaleParameters::new(2.0, -1024.0)
    );
    assert_eq!(
        RescaleParameters::from_dataset(&InMemDicomObject::new_empty()),
        RescaleParameters::IDENTITY
    );
}

#[test]
fn assembled_slices_pair_pixels_with_metadata_in_order() {
    let volume = Volume::from_data(stored_volume(), [1.0, 1.0, 1.0]).expect("volume");
    let source = vec![InMemDicomObject::new_empty()];
    let metadata = MetadataPropagator::new(&source).propagate(&volume).expect("metadata");

    let slices = assemble(&volume, &metadata).expect("assemble");

    assert_eq!(slices.len(), volume.dim().0);
    for (k, slice) in slices.iter().enumerate() {
        assert_eq!(slice.index, k);
        assert_eq!(slice.metadata.instance_number, k as u32 + 1);
        assert_eq!(slice.pixels, volume.data().slice(s![k, .., ..]));
    }
}

#[test]
fn assembling_mismatched_lengths_fails() {
    let volume = Volume::from_data(stored_volume(), [1.0, 1.0, 1.0]).expect("volume");
    let source = vec![InMemDicomObject::new_empty()];
    let mut metadata = MetadataPropagator::new(&source).propagate(&volume).expect("metadata");
    metadata.pop();

    let err = assemble(&volume, &metadata).expect_err("mismatch");

    assert!(matches!(
        err,
        ResampleError::SliceCountMismatch {
            volume_slices: 3,
            metadata_slices: 2
        }
    ));
}
