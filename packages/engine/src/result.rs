//! Computed impacts and their aggregates.

use crop_risk_crop_models::HazardType;
use crop_risk_exposure_models::ValueUnit;
use serde::{Deserialize, Serialize};

use crate::EngineError;
use crate::matrix::ImpactMatrix;

/// Impacts of every event at every exposure point.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactResult {
    /// Hazard type the impacts were computed for.
    pub haz_type: HazardType,
    /// Unit of the exposure values, and so of the impacts.
    pub unit: ValueUnit,
    /// Event names in row order.
    pub event_names: Vec<String>,
    /// Annual frequency of each event.
    pub frequency: Vec<f64>,
    /// Sparse events × points impacts.
    pub matrix: ImpactMatrix,
    /// Exposure points left out for lack of an assigned centroid.
    pub excluded_points: usize,
    /// Total exposed value of the included points.
    pub tot_value: f64,
}

impl ImpactResult {
    /// Total impact of each event over all points.
    #[must_use]
    pub fn at_event(&self) -> Vec<f64> {
        self.matrix.row_sums()
    }

    /// Expected annual impact at each point: `Σ_e freq[e] · impact[e, p]`.
    #[must_use]
    pub fn eai_exp(&self) -> Vec<f64> {
        self.matrix.weighted_column_sums(&self.frequency)
    }

    /// Average annual impact aggregated over all points:
    /// `Σ_e freq[e] · at_event[e]`. With uniform frequencies this is the
    /// mean of [`ImpactResult::at_event`].
    #[must_use]
    pub fn aai_agg(&self) -> f64 {
        self.at_event()
            .iter()
            .zip(&self.frequency)
            .map(|(imp, freq)| imp * freq)
            .sum()
    }

    /// Impacts of the named events, in the given order. Events keep their
    /// original frequency.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownEvent`] if a name is not present.
    pub fn select_events(&self, names: &[&str]) -> Result<Self, EngineError> {
        let rows = names
            .iter()
            .map(|name| {
                self.event_names
                    .iter()
                    .position(|n| n == name)
                    .ok_or_else(|| EngineError::UnknownEvent {
                        name: (*name).to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let points: Vec<usize> = (0..self.matrix.n_points()).collect();

        Ok(Self {
            event_names: rows.iter().map(|&r| self.event_names[r].clone()).collect(),
            frequency: rows.iter().map(|&r| self.frequency[r]).collect(),
            matrix: self.matrix.select(&rows, &points),
            ..self.clone()
        })
    }

    /// Impacts at the given exposure points, renumbered by their position
    /// in `points`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::PointOutOfRange`] for an invalid index and
    /// [`EngineError::DuplicatePoint`] for an index given twice.
    pub fn select_points(&self, points: &[usize]) -> Result<Self, EngineError> {
        let n_points = self.matrix.n_points();
        let mut seen = vec![false; n_points];
        for &index in points {
            if index >= n_points {
                return Err(EngineError::PointOutOfRange { index, n_points });
            }
            if std::mem::replace(&mut seen[index], true) {
                return Err(EngineError::DuplicatePoint { index });
            }
        }
        let rows: Vec<usize> = (0..self.matrix.n_events()).collect();

        Ok(Self {
            matrix: self.matrix.select(&rows, points),
            ..self.clone()
        })
    }

    /// Serializable aggregates.
    #[must_use]
    pub fn summary(&self) -> ImpactSummary {
        ImpactSummary {
            haz_type: self.haz_type,
            unit: self.unit,
            event_names: self.event_names.clone(),
            frequency: self.frequency.clone(),
            at_event: self.at_event(),
            eai_exp: self.eai_exp(),
            aai_agg: self.aai_agg(),
            tot_value: self.tot_value,
            excluded_points: self.excluded_points,
        }
    }
}

/// Aggregated impacts, as written by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactSummary {
    /// Hazard type.
    pub haz_type: HazardType,
    /// Impact unit.
    pub unit: ValueUnit,
    /// Event names in row order.
    pub event_names: Vec<String>,
    /// Annual frequency of each event.
    pub frequency: Vec<f64>,
    /// Total impact per event.
    pub at_event: Vec<f64>,
    /// Expected annual impact per exposure point.
    pub eai_exp: Vec<f64>,
    /// Average annual impact.
    pub aai_agg: f64,
    /// Total exposed value of the included points.
    pub tot_value: f64,
    /// Exposure points left out for lack of a centroid.
    pub excluded_points: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> ImpactResult {
        let mut matrix = ImpactMatrix::new(3);
        matrix.push_row([(0, -2.0), (2, 1.0)]);
        matrix.push_row([(1, 3.0)]);
        matrix.push_row([(0, 0.5), (1, 0.5), (2, 0.5)]);
        matrix.push_row(std::iter::empty());
        ImpactResult {
            haz_type: HazardType::RelativeCropyield,
            unit: ValueUnit::TonnesPerYear,
            event_names: vec!["2001", "2002", "2003", "2004"]
                .into_iter()
                .map(String::from)
                .collect(),
            frequency: vec![0.25; 4],
            matrix,
            excluded_points: 0,
            tot_value: 10.0,
        }
    }

    #[test]
    fn aggregates() {
        let r = result();
        assert_eq!(r.at_event(), vec![-1.0, 3.0, 1.5, 0.0]);
        assert!((r.aai_agg() - 0.875).abs() < 1e-12);
        let mean = r.at_event().iter().sum::<f64>() / 4.0;
        assert!((r.aai_agg() - mean).abs() < 1e-12);
        let eai = r.eai_exp();
        assert!((eai.iter().sum::<f64>() - r.aai_agg()).abs() < 1e-12);
        assert!((eai[1] - 0.875).abs() < 1e-12);
    }

    #[test]
    fn selected_events_keep_frequency() {
        let r = result().select_events(&["2003", "2001"]).unwrap();
        assert_eq!(r.event_names, vec!["2003", "2001"]);
        assert_eq!(r.frequency, vec![0.25, 0.25]);
        assert_eq!(r.at_event(), vec![1.5, -1.0]);
        assert!((r.aai_agg() - 0.125).abs() < 1e-12);
    }

    #[test]
    fn unknown_event_is_an_error() {
        assert!(matches!(
            result().select_events(&["1999"]),
            Err(EngineError::UnknownEvent { .. })
        ));
    }

    #[test]
    fn selects_points() {
        let r = result().select_points(&[2]).unwrap();
        assert_eq!(r.at_event(), vec![1.0, 0.0, 0.5, 0.0]);
        assert!(matches!(
            result().select_points(&[3]),
            Err(EngineError::PointOutOfRange { index: 3, .. })
        ));
    }

    #[test]
    fn repeated_point_is_rejected() {
        assert!(matches!(
            result().select_points(&[0, 2, 0]),
            Err(EngineError::DuplicatePoint { index: 0 })
        ));
        assert_eq!(result().select_points(&[2, 0]).unwrap().at_event().len(), 4);
    }

    #[test]
    fn summary_serializes() {
        let json = serde_json::to_value(result().summary()).unwrap();
        assert_eq!(json["hazType"], "RC");
        assert_eq!(json["unit"], "t/y");
        assert_eq!(json["atEvent"].as_array().unwrap().len(), 4);
    }
}
