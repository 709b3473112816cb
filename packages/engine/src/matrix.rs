//! Sparse events × points impact storage.

/// Row-compressed impact matrix. Only non-zero impacts are stored; each
/// row is one event and column indices within a row are ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactMatrix {
    n_points: usize,
    row_ptr: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
}

impl ImpactMatrix {
    /// An empty matrix with `n_points` columns and no rows.
    #[must_use]
    pub fn new(n_points: usize) -> Self {
        Self {
            n_points,
            row_ptr: vec![0],
            cols: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Appends one event row from `(point, impact)` pairs given in
    /// ascending point order. Zero impacts are dropped.
    ///
    /// # Panics
    ///
    /// Panics if a point index is out of range or indices are not
    /// ascending.
    pub fn push_row(&mut self, entries: impl IntoIterator<Item = (usize, f64)>) {
        let mut previous: Option<usize> = None;
        for (point, impact) in entries {
            assert!(point < self.n_points, "point {point} out of range");
            assert!(
                previous.is_none_or(|prev| prev < point),
                "points must be ascending"
            );
            previous = Some(point);
            if impact != 0.0 {
                self.cols.push(point);
                self.values.push(impact);
            }
        }
        self.row_ptr.push(self.cols.len());
    }

    /// Number of event rows.
    #[must_use]
    pub fn n_events(&self) -> usize {
        self.row_ptr.len() - 1
    }

    /// Number of point columns.
    #[must_use]
    pub const fn n_points(&self) -> usize {
        self.n_points
    }

    /// Number of stored entries.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Stored `(point, impact)` entries of one event.
    pub fn row(&self, event: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.row_ptr[event]..self.row_ptr[event + 1];
        self.cols[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// Impact of one event at one point, `0` where nothing is stored.
    #[must_use]
    pub fn get(&self, event: usize, point: usize) -> f64 {
        let range = self.row_ptr[event]..self.row_ptr[event + 1];
        self.cols[range.clone()]
            .binary_search(&point)
            .map_or(0.0, |i| self.values[range.start + i])
    }

    /// Sum of each row.
    #[must_use]
    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.n_events())
            .map(|e| self.row(e).map(|(_, v)| v).sum())
            .collect()
    }

    /// Weighted column sums: `Σ_e weights[e] · m[e, p]`.
    #[must_use]
    pub fn weighted_column_sums(&self, weights: &[f64]) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_points];
        for (e, &w) in weights.iter().enumerate().take(self.n_events()) {
            for (p, v) in self.row(e) {
                sums[p] += w * v;
            }
        }
        sums
    }

    /// The rows at `events` (in that order) and columns at `points`,
    /// renumbered by their position in `points`.
    #[must_use]
    pub fn select(&self, events: &[usize], points: &[usize]) -> Self {
        let mut new_col = vec![None; self.n_points];
        for (i, &p) in points.iter().enumerate() {
            new_col[p] = Some(i);
        }

        let mut selected = Self::new(points.len());
        for &e in events {
            let mut entries: Vec<(usize, f64)> = self
                .row(e)
                .filter_map(|(p, v)| new_col[p].map(|c| (c, v)))
                .collect();
            entries.sort_unstable_by_key(|&(c, _)| c);
            selected.push_row(entries);
        }
        selected
    }

    /// Dense copy, one `Vec` per event.
    #[must_use]
    pub fn to_dense(&self) -> Vec<Vec<f64>> {
        (0..self.n_events())
            .map(|e| {
                let mut row = vec![0.0; self.n_points];
                for (p, v) in self.row(e) {
                    row[p] = v;
                }
                row
            })
            .collect()
    }
}
