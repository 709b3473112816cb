//! Per crop/irrigation historical-mean baselines.
//!
//! A batch job starts from a list of historical yield files. Files are
//! grouped by their [`CropIrr`] key and every group gets one
//! [`HistoricalMeanAccumulator`] with exactly one row per file. Each file's
//! per-centroid historical mean is written to the next free row; once all
//! rows are filled the accumulator is reduced to the column mean.
//!
//! The reduction sums each column in sorted order, so the baseline is
//! bit-for-bit identical regardless of the order files are processed in.

use std::collections::BTreeMap;
use std::path::Path;

use crop_risk_crop_models::CropIrr;
use crop_risk_hazard_models::{BoundingBox, Centroids, YearRange};

use crate::HazardError;
use crate::file_name::HazardFileInfo;
use crate::progress::ProgressCallback;
use crate::source::HazardSource;

/// Row buffer for one crop/irrigation category.
///
/// Lifecycle: allocated with a fixed row count, filled once per contributing
/// file, then consumed by [`HistoricalMeanAccumulator::finalize`].
#[derive(Debug, Clone)]
pub struct HistoricalMeanAccumulator {
    key: CropIrr,
    capacity: usize,
    n_centroids: Option<usize>,
    filled: usize,
    values: Vec<f64>,
}

impl HistoricalMeanAccumulator {
    /// Allocates a buffer for `capacity` files. The column count is fixed by
    /// the first accumulated row.
    #[must_use]
    pub const fn new(key: CropIrr, capacity: usize) -> Self {
        Self {
            key,
            capacity,
            n_centroids: None,
            filled: 0,
            values: Vec::new(),
        }
    }

    /// Category key.
    #[must_use]
    pub const fn key(&self) -> CropIrr {
        self.key
    }

    /// Allocated row count (number of files in the category).
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Rows filled so far.
    #[must_use]
    pub const fn filled(&self) -> usize {
        self.filled
    }

    /// Whether every allocated row is filled.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.filled == self.capacity
    }

    /// The filled row at `index`.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&[f64]> {
        let n = self.n_centroids?;
        (index < self.filled).then(|| &self.values[index * n..(index + 1) * n])
    }

    /// Writes `hist_mean` into the next free row and returns its index.
    ///
    /// # Errors
    ///
    /// * [`HazardError::Capacity`] if every row is already filled.
    /// * [`HazardError::DimensionMismatch`] if the row length differs from
    ///   earlier rows.
    pub fn accumulate(&mut self, hist_mean: &[f64]) -> Result<usize, HazardError> {
        if self.is_full() {
            return Err(HazardError::Capacity {
                key: self.key,
                capacity: self.capacity,
            });
        }

        match self.n_centroids {
            Some(n) if n != hist_mean.len() => {
                return Err(HazardError::DimensionMismatch {
                    message: format!(
                        "{}: row has {} centroids, earlier rows have {n}",
                        self.key,
                        hist_mean.len()
                    ),
                });
            }
            Some(_) => {}
            None => {
                self.n_centroids = Some(hist_mean.len());
                self.values.reserve_exact(self.capacity * hist_mean.len());
            }
        }

        self.values.extend_from_slice(hist_mean);
        let index = self.filled;
        self.filled += 1;
        Ok(index)
    }

    /// Reduces the buffer to its column-wise mean.
    ///
    /// # Errors
    ///
    /// Returns [`HazardError::PartialAggregation`] unless every allocated
    /// row has been filled.
    #[allow(clippy::cast_precision_loss)]
    pub fn finalize(self) -> Result<Vec<f64>, HazardError> {
        if !self.is_full() || self.capacity == 0 {
            return Err(HazardError::PartialAggregation {
                key: self.key,
                filled: self.filled,
                capacity: self.capacity,
            });
        }
        let n = self.n_centroids.unwrap_or(0);

        let mut column = Vec::with_capacity(self.filled);
        let mut mean = Vec::with_capacity(n);
        for c in 0..n {
            column.clear();
            column.extend((0..self.filled).map(|r| self.values[r * n + c]));
            column.sort_unstable_by(f64::total_cmp);
            mean.push(column.iter().sum::<f64>() / self.filled as f64);
        }
        Ok(mean)
    }
}

/// Accumulators for every category found in a file list.
#[derive(Debug, Clone)]
pub struct HistoricalMeanSet {
    categories: Vec<CropIrr>,
    files: Vec<HazardFileInfo>,
    accumulators: BTreeMap<CropIrr, HistoricalMeanAccumulator>,
}

impl HistoricalMeanSet {
    /// Partitions `file_names` by crop/irrigation key and allocates one
    /// accumulator per key, sized by the number of files sharing it.
    ///
    /// Categories are listed in order of first appearance.
    ///
    /// # Errors
    ///
    /// Returns [`HazardError::InvalidFileName`] if a name cannot be parsed.
    pub fn initialize_categories<S: AsRef<str>>(file_names: &[S]) -> Result<Self, HazardError> {
        let files = file_names
            .iter()
            .map(|name| name.as_ref().parse::<HazardFileInfo>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut categories = Vec::new();
        let mut counts: BTreeMap<CropIrr, usize> = BTreeMap::new();
        for file in &files {
            let count = counts.entry(file.crop_irr).or_insert(0);
            if *count == 0 {
                categories.push(file.crop_irr);
            }
            *count += 1;
        }

        let accumulators = counts
            .into_iter()
            .map(|(key, count)| (key, HistoricalMeanAccumulator::new(key, count)))
            .collect();

        log::debug!(
            "Initialized {} historical-mean categories from {} files",
            categories.len(),
            files.len()
        );

        Ok(Self {
            categories,
            files,
            accumulators,
        })
    }

    /// Category keys in order of first appearance.
    #[must_use]
    pub fn categories(&self) -> &[CropIrr] {
        &self.categories
    }

    /// Parsed file metadata in input order.
    #[must_use]
    pub fn files(&self) -> &[HazardFileInfo] {
        &self.files
    }

    /// Accumulator of one category.
    #[must_use]
    pub fn accumulator(&self, key: CropIrr) -> Option<&HistoricalMeanAccumulator> {
        self.accumulators.get(&key)
    }

    /// Writes one file's historical mean into its category.
    ///
    /// # Errors
    ///
    /// * [`HazardError::UnknownCategory`] if `key` was not seen during
    ///   initialization.
    /// * Any error of [`HistoricalMeanAccumulator::accumulate`].
    pub fn accumulate(&mut self, key: CropIrr, hist_mean: &[f64]) -> Result<usize, HazardError> {
        self.accumulators
            .get_mut(&key)
            .ok_or(HazardError::UnknownCategory { key })?
            .accumulate(hist_mean)
    }

    /// Finalizes every category.
    ///
    /// # Errors
    ///
    /// Returns [`HazardError::PartialAggregation`] for the first category
    /// with unfilled rows.
    pub fn finalize(self) -> Result<BTreeMap<CropIrr, Vec<f64>>, HazardError> {
        self.accumulators
            .into_iter()
            .map(|(key, acc)| acc.finalize().map(|mean| (key, mean)))
            .collect()
    }
}

/// Finalized baselines together with the grid they refer to.
#[derive(Debug, Clone)]
pub struct HistoricalBaseline {
    /// Categories in order of first appearance in the file list.
    pub categories: Vec<CropIrr>,
    /// Mean historical yield per centroid, by category.
    pub means: BTreeMap<CropIrr, Vec<f64>>,
    /// Centroids of the first loaded file; all files share this grid.
    pub centroids: Centroids,
}

/// Builds the historical-mean baseline of every crop/irrigation category in
/// `file_names`.
///
/// Each file is loaded from `input_dir` through `source`, reduced to its
/// per-centroid mean over `yearrange_mean`, and accumulated into its
/// category. The result does not depend on the order of `file_names`.
///
/// # Errors
///
/// Returns an error if a file name cannot be parsed, a file cannot be
/// loaded, a file has no event in `yearrange_mean`, files disagree on the
/// number of centroids, or a category ends up incomplete.
pub fn aggregate_historical_means<S: HazardSource + ?Sized>(
    file_names: &[String],
    input_dir: &Path,
    source: &S,
    bbox: Option<&BoundingBox>,
    yearrange_mean: YearRange,
    progress: &dyn ProgressCallback,
) -> Result<HistoricalBaseline, HazardError> {
    let mut set = HistoricalMeanSet::initialize_categories(file_names)?;
    let files = set.files().to_vec();

    progress.set_total(files.len() as u64);
    let mut centroids: Option<Centroids> = None;

    for file in &files {
        progress.set_message(file.file_name.clone());

        let hazard = source.load_file(&input_dir.join(&file.file_name), bbox, None)?;
        let hist_mean = hazard.calc_mean(yearrange_mean)?;
        let row = set.accumulate(file.crop_irr, &hist_mean)?;
        log::debug!(
            "{}: historical mean {yearrange_mean} stored in row {row} of {}",
            file.file_name,
            file.crop_irr
        );

        if centroids.is_none() {
            centroids = Some(hazard.centroids().clone());
        }
        progress.inc(1);
    }

    let categories = set.categories().to_vec();
    let means = set.finalize()?;
    progress.finish(format!(
        "Historical means for {} categories from {} files",
        categories.len(),
        files.len()
    ));
    log::info!(
        "Built historical-mean baselines for {}",
        categories
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(HistoricalBaseline {
        categories,
        means,
        centroids: centroids.unwrap_or_default(),
    })
}
