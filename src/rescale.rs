//
// rescale.rs
// Dicom-Resample-rs
//
// Reverts the modality rescale (value = stored * slope + intercept) so written pixels match the written slope/intercept.
//
// Thales Matheus Mendonça Santos - November 2025

use dicom::dictionary_std::tags;
use dicom::object::InMemDicomObject;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dicom_access::ElementAccess;
use crate::error::{ResampleError, Result};
use crate::interpolate::to_sample;
use crate::volume::Volume;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RescaleParameters {
    pub slope: f64,
    pub intercept: f64,
}

impl Default for RescaleParameters {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RescaleParameters {
    pub const IDENTITY: RescaleParameters = RescaleParameters {
        slope: 1.0,
        intercept: 0.0,
    };

    pub fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    /// Reads RescaleSlope/RescaleIntercept from a dataset, defaulting to identity.
    pub fn from_dataset(obj: &InMemDicomObject) -> Self {
        Self {
            slope: obj.element_float(tags::RESCALE_SLOPE).unwrap_or(1.0),
            intercept: obj.element_float(tags::RESCALE_INTERCEPT).unwrap_or(0.0),
        }
    }

    /// Parameters of the first slice. Later slices disagreeing only produce a warning.
    pub fn from_series(slices: &[InMemDicomObject]) -> Self {
        let Some(first) = slices.first() else {
            return Self::IDENTITY;
        };
        let params = Self::from_dataset(first);
        if slices.iter().skip(1).any(|s| Self::from_dataset(s) != params) {
            warn!(
                slope = params.slope,
                intercept = params.intercept,
                "Rescale parameters vary across slices; using those of the first slice"
            );
        }
        params
    }

    pub fn is_identity(&self) -> bool {
        self.slope == 1.0 && self.intercept == 0.0
    }

    pub fn validate(&self) -> Result<()> {
        if self.slope == 0.0 || !self.slope.is_finite() || !self.intercept.is_finite() {
            return Err(ResampleError::InvalidRescaleParameters {
                slope: self.slope,
                intercept: self.intercept,
            });
        }
        Ok(())
    }

    /// stored = (value - intercept) / slope
    pub fn to_stored(&self, value: f64) -> f64 {
        (value - self.intercept) / self.slope
    }

    /// value = stored * slope + intercept
    pub fn to_value(&self, stored: f64) -> f64 {
        stored.mul_add(self.slope, self.intercept)
    }
}

/// Undoes a rescale the decoder applied transparently, if it applied one.
#[derive(Debug, Clone, Copy)]
pub struct RescaleNormalizer {
    params: RescaleParameters,
    decoder_applies_rescale: bool,
}

impl RescaleNormalizer {
    pub fn new(params: RescaleParameters, decoder_applies_rescale: bool) -> Self {
        Self {
            params,
            decoder_applies_rescale,
        }
    }

    pub fn is_active(&self) -> bool {
        self.decoder_applies_rescale
    }

    pub fn parameters(&self) -> RescaleParameters {
        self.params
    }

    pub fn normalize(&self, volume: Volume) -> Result<Volume> {
        if !self.is_active() {
            return Ok(volume);
        }
        self.params.validate()?;
        if self.params.is_identity() {
            debug!("Identity rescale; pixel values already match stored values");
            return Ok(volume);
        }

        debug!(
            slope = self.params.slope,
            intercept = self.params.intercept,
            "Reverting decoder rescale"
        );
        let params = self.params;
        let stored = volume
            .data()
            .mapv(|v| to_sample(params.to_stored(f64::from(v))));
        volume.with_data(stored)
    }
}

/// Shorthand for an active normalizer.
pub fn undo_rescale(volume: Volume, params: RescaleParameters) -> Result<Volume> {
    RescaleNormalizer::new(params, true).normalize(volume)
}
