//! The impact calculator.

use std::collections::BTreeMap;

use crop_risk_exposure_models::Exposures;
use crop_risk_hazard_models::Hazard;
use crop_risk_impact_funcs::{ImpactFuncSet, ImpactFunction};

use crate::EngineError;
use crate::matrix::ImpactMatrix;
use crate::result::ImpactResult;

/// A point that takes part in the computation.
struct ActivePoint<'a> {
    index: usize,
    centroid: usize,
    value: f64,
    function: &'a ImpactFunction,
}

/// Computes the impact of every hazard event at every exposure point.
///
/// For a point with value `v`, centroid `c`, and impact function `f`, the
/// impact of event `e` is `f(intensity[e, c]) * v`. Points without an
/// assigned centroid are excluded and counted. `NaN` values are treated as
/// `0`, so a point with no data contributes nothing. Inputs are not
/// modified.
///
/// # Errors
///
/// * [`EngineError::MissingFunction`] if a record names an impact function
///   not registered for the hazard type.
/// * [`EngineError::ImpactFunc`] if a used function is invalid.
/// * [`EngineError::CentroidOutOfRange`] if a record points past the
///   hazard's centroids.
pub fn compute_impact(
    hazard: &Hazard,
    exposures: &Exposures,
    impact_funcs: &ImpactFuncSet,
) -> Result<ImpactResult, EngineError> {
    let haz_type = hazard.haz_type();
    let n_centroids = hazard.centroids().len();

    let mut functions: BTreeMap<u32, &ImpactFunction> = BTreeMap::new();
    let mut points = Vec::new();
    let mut excluded = 0_usize;
    let mut nan_values = 0_usize;
    let mut tot_value = 0.0;

    for (index, record) in exposures.records.iter().enumerate() {
        let Some(centroid) = record.centroid else {
            excluded += 1;
            continue;
        };
        if centroid >= n_centroids {
            return Err(EngineError::CentroidOutOfRange {
                point: index,
                centroid,
                n_centroids,
            });
        }

        let function = if let Some(function) = functions.get(&record.impf_id) {
            *function
        } else {
            let function = impact_funcs
                .get(haz_type, record.impf_id)
                .ok_or(EngineError::MissingFunction {
                    haz_type,
                    id: record.impf_id,
                })?;
            function.check()?;
            functions.insert(record.impf_id, function);
            function
        };

        let value = if record.value.is_nan() {
            nan_values += 1;
            0.0
        } else {
            record.value
        };
        tot_value += value;

        if value != 0.0 {
            points.push(ActivePoint {
                index,
                centroid,
                value,
                function,
            });
        }
    }

    if nan_values > 0 {
        log::info!("Normalized {nan_values} NaN exposure values to 0");
    }
    if excluded > 0 {
        log::warn!("Excluded {excluded} exposure points without an assigned centroid");
    }

    let intensity = hazard.intensity();
    let mut matrix = ImpactMatrix::new(exposures.len());
    for event in 0..hazard.size() {
        let row = intensity.row(event);
        matrix.push_row(
            points
                .iter()
                .map(|p| (p.index, p.function.evaluate(row[p.centroid]) * p.value)),
        );
    }

    log::debug!(
        "Computed {} events x {} points, {} non-zero impacts",
        hazard.size(),
        exposures.len(),
        matrix.nnz()
    );

    Ok(ImpactResult {
        haz_type,
        unit: exposures.value_unit,
        event_names: hazard.events().iter().map(|e| e.name.clone()).collect(),
        frequency: hazard.frequency().to_vec(),
        matrix,
        excluded_points: excluded,
        tot_value,
    })
}

#[cfg(test)]
mod tests {
    use crop_risk_crop_models::HazardType;
    use crop_risk_exposure_models::ExposureRecord;
    use crop_risk_hazard_models::{Centroid, Centroids, Event, IntensityMatrix};

    use super::*;

    /// Three annual events over four centroids in two countries.
    fn hazard() -> Hazard {
        let centroids = Centroids::new(vec![
            Centroid::new(39.75, 116.25).with_region(156),
            Centroid::new(39.75, 116.75).with_region(156),
            Centroid::new(39.25, 116.25).with_region(156),
            Centroid::new(35.75, 139.75).with_region(392),
        ]);
        let intensity = IntensityMatrix::from_rows(
            vec![
                vec![-0.12, 0.31, 0.0, -0.5],
                vec![0.07, -0.43, f64::NAN, 0.2],
                vec![-0.33, 0.02, -0.9, 0.0],
            ],
            4,
        )
        .unwrap();
        Hazard::new(
            HazardType::RelativeCropyield,
            (2001..=2003).map(Event::from_year).collect(),
            centroids,
            intensity,
        )
        .unwrap()
    }

    fn exposures(values: [f64; 4]) -> Exposures {
        Exposures::new(vec![
            ExposureRecord::new(39.75, 116.25, values[0])
                .with_region(156)
                .with_centroid(0),
            ExposureRecord::new(39.75, 116.75, values[1])
                .with_region(156)
                .with_centroid(1),
            ExposureRecord::new(39.25, 116.25, values[2])
                .with_region(156)
                .with_centroid(2),
            ExposureRecord::new(35.75, 139.75, values[3])
                .with_region(392)
                .with_centroid(3),
        ])
    }

    #[test]
    fn impact_equals_intensity_times_value() {
        let hazard = hazard();
        let exposures = exposures([1520.4, 873.1, 0.0, 2210.9]);
        let result = compute_impact(&hazard, &exposures, &ImpactFuncSet::relative_yield()).unwrap();

        let selected = result.select_events(&["2002"]).unwrap().select_points(&[0, 1, 2]).unwrap();
        let event = hazard.event_index("2002").unwrap();
        for (p, record) in exposures.records[..3].iter().enumerate() {
            let intensity = hazard.intensity().get(event, record.centroid.unwrap());
            let manual = if intensity.is_nan() {
                0.0
            } else {
                intensity * record.value
            };
            assert_eq!((selected.matrix.get(0, p) - manual).abs(), 0.0);
        }
        assert_eq!(result.excluded_points, 0);
    }

    #[test]
    fn nan_and_zero_values_are_equivalent() {
        let hazard = hazard();
        let impfs = ImpactFuncSet::relative_yield();
        let zeros = compute_impact(&hazard, &exposures([10.0, 0.0, 0.0, 5.0]), &impfs).unwrap();
        let nans =
            compute_impact(&hazard, &exposures([10.0, f64::NAN, f64::NAN, 5.0]), &impfs).unwrap();
        assert_eq!(zeros.at_event(), nans.at_event());
        assert_eq!(zeros.aai_agg().to_bits(), nans.aai_agg().to_bits());
        assert_eq!(zeros.matrix, nans.matrix);
    }

    #[test]
    fn aai_agg_is_mean_of_event_totals() {
        let result = compute_impact(
            &hazard(),
            &exposures([1.0, 2.0, 3.0, 4.0]),
            &ImpactFuncSet::relative_yield(),
        )
        .unwrap();
        let at_event = result.at_event();
        let mean = at_event.iter().sum::<f64>() / 3.0;
        assert!((result.aai_agg() - mean).abs() < 1e-12);
        let eai_total: f64 = result.eai_exp().iter().sum();
        assert!((eai_total - result.aai_agg()).abs() < 1e-12);
        assert!((result.tot_value - 10.0).abs() < 1e-12);
    }

    #[test]
    fn unassigned_points_are_excluded_and_counted() {
        let mut exposures = exposures([1.0, 2.0, 3.0, 4.0]);
        exposures.records[3].centroid = None;
        let result =
            compute_impact(&hazard(), &exposures, &ImpactFuncSet::relative_yield()).unwrap();
        assert_eq!(result.excluded_points, 1);
        assert_eq!(result.matrix.n_points(), 4);
        assert!(result.eai_exp()[3].abs() < f64::EPSILON);
    }

    #[test]
    fn missing_function_is_an_error() {
        let mut exposures = exposures([1.0; 4]);
        exposures.records[1].impf_id = 7;
        assert!(matches!(
            compute_impact(&hazard(), &exposures, &ImpactFuncSet::relative_yield()),
            Err(EngineError::MissingFunction { id: 7, .. })
        ));
        assert!(matches!(
            compute_impact(&hazard(), &exposures, &ImpactFuncSet::drought()),
            Err(EngineError::MissingFunction { id: 1, .. })
        ));
    }

    #[test]
    fn centroid_out_of_range_is_an_error() {
        let mut exposures = exposures([1.0; 4]);
        exposures.records[0].centroid = Some(4);
        assert!(matches!(
            compute_impact(&hazard(), &exposures, &ImpactFuncSet::relative_yield()),
            Err(EngineError::CentroidOutOfRange { centroid: 4, .. })
        ));
    }

    #[test]
    fn drought_damage_fraction() {
        let hazard = hazard().with_haz_type(HazardType::Drought);
        let exposures = exposures([100.0; 4]);
        let result = compute_impact(&hazard, &exposures, &ImpactFuncSet::drought()).unwrap();
        assert!(result.at_event().iter().all(|v| *v == 0.0));

        let spi = hazard
            .with_intensity(IntensityMatrix::new(3, 4, vec![-5.0; 12]).unwrap())
            .unwrap();
        let result = compute_impact(&spi, &exposures, &ImpactFuncSet::drought()).unwrap();
        assert_eq!(result.at_event(), vec![400.0; 3]);
    }
}
