//! Conversion of raw yields into relative yield anomalies.

use crop_risk_crop_models::HazardType;
use crop_risk_crop_models::CropIrr;
use crop_risk_hazard_models::{Hazard, IntensityMatrix, YieldBaseline};

use crate::HazardError;

/// Relative deviation of each value from its baseline.
///
/// Computes `(raw - mean) / mean` per column. Where the baseline is exactly
/// zero (no crop grown) the anomaly is `0.0`, never `NaN` or infinite.
///
/// # Errors
///
/// Returns [`HazardError::DimensionMismatch`] if the slices differ in length.
pub fn to_relative_anomaly(raw: &[f64], mean: &[f64]) -> Result<Vec<f64>, HazardError> {
    if raw.len() != mean.len() {
        return Err(HazardError::DimensionMismatch {
            message: format!("{} values against a baseline of {}", raw.len(), mean.len()),
        });
    }
    Ok(raw
        .iter()
        .zip(mean)
        .map(|(&raw, &mean)| {
            if mean == 0.0 {
                0.0
            } else {
                (raw - mean) / mean
            }
        })
        .collect())
}

/// Converts a raw yield hazard into a relative crop yield hazard.
///
/// Every event row is transformed independently with
/// [`to_relative_anomaly`]. The result carries hazard type
/// [`HazardType::RelativeCropyield`] and a dimensionless unit.
///
/// # Errors
///
/// Returns [`HazardError::DimensionMismatch`] if `hist_mean` does not have
/// one value per centroid.
pub fn to_relative_yield(hazard: &Hazard, hist_mean: &[f64]) -> Result<Hazard, HazardError> {
    let n_centroids = hazard.centroids().len();
    if hist_mean.len() != n_centroids {
        return Err(HazardError::DimensionMismatch {
            message: format!(
                "historical mean has {} values, hazard has {n_centroids} centroids",
                hist_mean.len()
            ),
        });
    }

    let rows = hazard
        .intensity()
        .rows()
        .map(|row| to_relative_anomaly(row, hist_mean))
        .collect::<Result<_, _>>()?;
    let intensity = IntensityMatrix::from_rows(rows, n_centroids)?;

    log::debug!(
        "Converted {} events x {n_centroids} centroids to relative yield",
        hazard.size()
    );

    Ok(hazard
        .clone()
        .with_intensity(intensity)?
        .with_haz_type(HazardType::RelativeCropyield)
        .with_units(""))
}

/// Converts a raw yield hazard into relative yield using the stored baseline
/// of `key`, matched to the hazard's centroids by coordinates.
///
/// # Errors
///
/// Returns [`HazardError::Model`] if the baseline lacks `key` or a hazard
/// centroid is not on the baseline grid.
pub fn relative_yield_from_baseline(
    hazard: &Hazard,
    baseline: &YieldBaseline,
    key: CropIrr,
) -> Result<Hazard, HazardError> {
    let hist_mean = baseline.aligned_mean(key, hazard.centroids())?;
    to_relative_yield(hazard, &hist_mean)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crop_risk_crop_models::{Crop, Irrigation};
    use crop_risk_hazard_models::{Centroids, Event, HazardModelError, YearRange};

    use super::*;

    #[test]
    fn zero_baseline_yields_zero() {
        let anomaly = to_relative_anomaly(&[5.0, 0.0, 3.0], &[0.0, 0.0, 2.0]).unwrap();
        assert_eq!(anomaly, vec![0.0, 0.0, 0.5]);
        assert!(anomaly.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn anomaly_is_negative_for_losses() {
        let anomaly = to_relative_anomaly(&[1.5], &[2.0]).unwrap();
        assert!((anomaly[0] + 0.25).abs() < 1e-12);
    }

    #[test]
    fn anomaly_of_unequal_lengths_is_an_error() {
        assert!(matches!(
            to_relative_anomaly(&[1.0, 2.0], &[1.0]),
            Err(HazardError::DimensionMismatch { .. })
        ));
    }

    fn whe_baseline(lats: &[f64], lons: &[f64], means: Vec<f64>) -> YieldBaseline {
        let key = CropIrr::new(Crop::Whe, Irrigation::Noirr);
        YieldBaseline {
            yearrange: YearRange::new(1980, 2005).unwrap(),
            categories: vec![key],
            centroids: Centroids::from_grid(lats, lons),
            means: BTreeMap::from([(key, means)]),
        }
    }

    fn yields(lats: &[f64], lons: &[f64]) -> Hazard {
        let centroids = Centroids::from_grid(lats, lons);
        let n = centroids.len();
        Hazard::new(
            HazardType::Drought,
            vec![Event::from_year(2001)],
            centroids,
            IntensityMatrix::new(1, n, vec![3.0; n]).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn baseline_on_larger_grid_is_subset_by_coordinates() {
        let baseline = whe_baseline(&[50.25, 49.75], &[8.25, 8.75], vec![1.0, 2.0, 4.0, 6.0]);
        let hazard = yields(&[49.75], &[8.25, 8.75]);
        let key = CropIrr::new(Crop::Whe, Irrigation::Noirr);

        let rel = relative_yield_from_baseline(&hazard, &baseline, key).unwrap();
        assert_eq!(rel.intensity().values(), &[-0.25, -0.5]);
    }

    #[test]
    fn baseline_on_another_window_of_equal_size_is_rejected() {
        let baseline = whe_baseline(&[50.25], &[8.25, 8.75], vec![1.0, 2.0]);
        let hazard = yields(&[45.25], &[8.25, 8.75]);
        let key = CropIrr::new(Crop::Whe, Irrigation::Noirr);

        assert!(matches!(
            relative_yield_from_baseline(&hazard, &baseline, key),
            Err(HazardError::Model(HazardModelError::UnmatchedCentroid { .. }))
        ));
    }

    #[test]
    fn transforms_every_event_row() {
        let hazard = Hazard::new(
            HazardType::Drought,
            vec![Event::from_year(2001), Event::from_year(2002)],
            Centroids::from_grid(&[0.0], &[0.0, 1.0]),
            IntensityMatrix::new(2, 2, vec![2.0, 1.0, 4.0, 1.0]).unwrap(),
        )
        .unwrap();

        let rel = to_relative_yield(&hazard, &[2.0, 0.0]).unwrap();
        assert_eq!(rel.haz_type(), HazardType::RelativeCropyield);
        assert_eq!(rel.intensity().values(), &[0.0, 0.0, 1.0, 0.0]);
        assert_eq!(rel.frequency(), hazard.frequency());
    }

    #[test]
    fn rejects_baseline_of_wrong_length() {
        let hazard = Hazard::new(
            HazardType::RelativeCropyield,
            vec![Event::from_year(2001)],
            Centroids::from_grid(&[0.0], &[0.0, 1.0]),
            IntensityMatrix::zeros(1, 2),
        )
        .unwrap();
        assert!(matches!(
            to_relative_yield(&hazard, &[1.0]),
            Err(HazardError::DimensionMismatch { .. })
        ));
    }
}
