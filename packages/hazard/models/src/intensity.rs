//! Dense event-major intensity matrix.

use crate::HazardModelError;

/// Hazard intensity per event (row) and centroid (column).
///
/// Values are signed: relative yield anomalies are negative for losses.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityMatrix {
    n_events: usize,
    n_centroids: usize,
    values: Vec<f64>,
}

impl IntensityMatrix {
    /// Creates a matrix from row-major values.
    ///
    /// # Errors
    ///
    /// Returns [`HazardModelError::Shape`] if `values` does not hold exactly
    /// `n_events * n_centroids` entries.
    pub fn new(
        n_events: usize,
        n_centroids: usize,
        values: Vec<f64>,
    ) -> Result<Self, HazardModelError> {
        if values.len() != n_events * n_centroids {
            return Err(HazardModelError::Shape {
                message: format!(
                    "{} values do not fill a {n_events}x{n_centroids} intensity matrix",
                    values.len()
                ),
            });
        }
        Ok(Self {
            n_events,
            n_centroids,
            values,
        })
    }

    /// Creates a matrix of zeros.
    #[must_use]
    pub fn zeros(n_events: usize, n_centroids: usize) -> Self {
        Self {
            n_events,
            n_centroids,
            values: vec![0.0; n_events * n_centroids],
        }
    }

    /// Creates a matrix from one vector per event.
    ///
    /// # Errors
    ///
    /// Returns [`HazardModelError::Shape`] if any row length differs from
    /// `n_centroids`.
    pub fn from_rows(rows: Vec<Vec<f64>>, n_centroids: usize) -> Result<Self, HazardModelError> {
        let n_events = rows.len();
        let mut values = Vec::with_capacity(n_events * n_centroids);
        for (event, row) in rows.into_iter().enumerate() {
            if row.len() != n_centroids {
                return Err(HazardModelError::Shape {
                    message: format!(
                        "event row {event} has {} columns, expected {n_centroids}",
                        row.len()
                    ),
                });
            }
            values.extend(row);
        }
        Ok(Self {
            n_events,
            n_centroids,
            values,
        })
    }

    /// Number of rows.
    #[must_use]
    pub const fn n_events(&self) -> usize {
        self.n_events
    }

    /// Number of columns.
    #[must_use]
    pub const fn n_centroids(&self) -> usize {
        self.n_centroids
    }

    /// Intensities of one event across all centroids.
    ///
    /// # Panics
    ///
    /// Panics if `event` is out of range.
    #[must_use]
    pub fn row(&self, event: usize) -> &[f64] {
        let start = event * self.n_centroids;
        &self.values[start..start + self.n_centroids]
    }

    /// Iterates over event rows.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.n_events).map(|e| self.row(e))
    }

    /// Intensity of one event at one centroid.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    #[must_use]
    pub fn get(&self, event: usize, centroid: usize) -> f64 {
        assert!(centroid < self.n_centroids, "centroid {centroid} out of range");
        self.values[event * self.n_centroids + centroid]
    }

    /// Intensities of all events at one centroid.
    pub fn column(&self, centroid: usize) -> impl Iterator<Item = f64> + '_ {
        self.rows().map(move |row| row[centroid])
    }

    /// Row-major values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mean over all entries; `NaN` for an empty matrix.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return f64::NAN;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// New matrix with the given event rows, in that order.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of range.
    #[must_use]
    pub fn select_rows(&self, events: &[usize]) -> Self {
        let mut values = Vec::with_capacity(events.len() * self.n_centroids);
        for &event in events {
            values.extend_from_slice(self.row(event));
        }
        Self {
            n_events: events.len(),
            n_centroids: self.n_centroids,
            values,
        }
    }

    /// New matrix with the given centroid columns, in that order.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of range.
    #[must_use]
    pub fn select_columns(&self, centroids: &[usize]) -> Self {
        let mut values = Vec::with_capacity(self.n_events * centroids.len());
        for row in self.rows() {
            values.extend(centroids.iter().map(|&c| row[c]));
        }
        Self {
            n_events: self.n_events,
            n_centroids: centroids.len(),
            values,
        }
    }
}
