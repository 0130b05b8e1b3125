use ndarray::Array3;

use crate::models::{IntensitySummary, VolumeSummary};
use crate::volume::Volume;

/// Min, max, mean and standard deviation over every voxel.
pub fn intensity_summary(data: &Array3<i16>) -> IntensitySummary {
    if data.is_empty() {
        return IntensitySummary::default();
    }

    let min = data.iter().copied().min().map_or(0.0, f64::from);
    let max = data.iter().copied().max().map_or(0.0, f64::from);
    let sum: f64 = data.iter().map(|&v| f64::from(v)).sum();
    let count = data.len() as f64;
    let mean = sum / count;

    let variance = data
        .iter()
        .map(|&v| {
            let diff = mean - f64::from(v);
            diff * diff
        })
        .sum::<f64>()
        / count;

    IntensitySummary {
        min,
        max,
        mean,
        std_dev: variance.sqrt(),
        total_voxels: data.len(),
    }
}

pub fn volume_summary(volume: &Volume) -> VolumeSummary {
    VolumeSummary {
        size: volume.size(),
        spacing: volume.spacing(),
        origin: volume.origin(),
        intensity: intensity_summary(volume.data()),
    }
}
