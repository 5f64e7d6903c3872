//! Train/test splitting and standardization.
use crate::dataset::{Dataset, FeatureTable, LabelTable, TableError};
use crate::functions;
use crate::table::CLASSES;
use itertools::Itertools as _;
use rand::rngs::StdRng;
use rand::seq::SliceRandom as _;
use rand::SeedableRng;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// What to do with a training column whose standard deviation is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegeneratePolicy {
    /// Fail with [`PreprocessError::DegenerateFeature`].
    Reject,
    /// Center the column and keep a scale of 1.0.
    UnitScale,
}

#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub test_fraction: f64,
    pub seed: u64,
    pub stratify: bool,
    pub degenerate: DegeneratePolicy,
}

impl SplitOptions {
    pub fn test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn stratify(mut self, enabled: bool) -> Self {
        self.stratify = enabled;
        self
    }

    pub fn degenerate(mut self, policy: DegeneratePolicy) -> Self {
        self.degenerate = policy;
        self
    }
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            stratify: false,
            degenerate: DegeneratePolicy::UnitScale,
        }
    }
}

/// Disjoint train and test rows of one dataset.
#[derive(Debug, Clone)]
pub struct Partition {
    pub train_features: FeatureTable,
    pub train_labels: LabelTable,
    pub test_features: FeatureTable,
    pub test_labels: LabelTable,
    /// Source row of each training row.
    pub train_rows: Vec<usize>,
    /// Source row of each test row.
    pub test_rows: Vec<usize>,
}

impl Partition {
    pub fn train_len(&self) -> usize {
        self.train_labels.len()
    }

    pub fn test_len(&self) -> usize {
        self.test_labels.len()
    }
}

/// Per-column mean and population standard deviation of the training rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalingParameters {
    means: Vec<f64>,
    stddevs: Vec<f64>,
}

impl ScalingParameters {
    pub fn fit(table: &FeatureTable, policy: DegeneratePolicy) -> Result<Self, PreprocessError> {
        let mut means = Vec::with_capacity(table.features_len());
        let mut stddevs = Vec::with_capacity(table.features_len());
        for (name, column) in table.names().iter().zip(table.columns()) {
            let (mean, stddev) = functions::mean_and_stddev(column.iter().copied());
            let stddev = if stddev > f64::EPSILON * mean.abs().max(1.0) {
                stddev
            } else {
                match policy {
                    DegeneratePolicy::Reject => {
                        return Err(PreprocessError::DegenerateFeature {
                            column: name.clone(),
                        })
                    }
                    DegeneratePolicy::UnitScale => {
                        warn!(column = %name, "zero variance feature; using unit scale");
                        1.0
                    }
                }
            };
            means.push(mean);
            stddevs.push(stddev);
        }
        Ok(Self { means, stddevs })
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn stddevs(&self) -> &[f64] {
        &self.stddevs
    }

    /// Applies `(x - mean) / stddev` column by column.
    pub fn transform(&self, table: &FeatureTable) -> Result<FeatureTable, PreprocessError> {
        if table.features_len() != self.means.len() {
            return Err(PreprocessError::ColumnCountMismatch {
                expected: self.means.len(),
                actual: table.features_len(),
            });
        }
        let columns = table
            .columns()
            .iter()
            .zip(self.means.iter().zip(self.stddevs.iter()))
            .map(|(column, (m, s))| column.iter().map(|x| (x - m) / s).collect())
            .collect();
        Ok(table.with_columns(columns)?)
    }
}

/// Splits `dataset` and standardizes both sides with parameters fit on the
/// training side only.
pub fn split_and_scale(
    dataset: &Dataset,
    options: &SplitOptions,
) -> Result<(Partition, ScalingParameters), PreprocessError> {
    let raw = train_test_split(dataset, options)?;
    let scaling = ScalingParameters::fit(&raw.train_features, options.degenerate)?;
    let partition = Partition {
        train_features: scaling.transform(&raw.train_features)?,
        test_features: scaling.transform(&raw.test_features)?,
        ..raw
    };
    debug!(means = ?scaling.means(), stddevs = ?scaling.stddevs(), "scaling fitted");
    Ok((partition, scaling))
}

/// Seeded shuffle split. The test side gets `ceil(test_fraction * n)` rows.
pub fn train_test_split(
    dataset: &Dataset,
    options: &SplitOptions,
) -> Result<Partition, PreprocessError> {
    let n = dataset.rows_len();
    let fraction = options.test_fraction;
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(PreprocessError::InvalidSplit(format!(
            "test fraction must be within (0, 1), got {}",
            fraction
        )));
    }
    let test_len = (fraction * n as f64).ceil() as usize;
    if test_len == 0 || test_len >= n {
        return Err(PreprocessError::InvalidSplit(format!(
            "{} rows cannot be split with test fraction {}",
            n, fraction
        )));
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let (test_rows, train_rows) = if options.stratify {
        stratified_rows(dataset.labels(), test_len, &mut rng)
    } else {
        let mut permutation = (0..n).collect::<Vec<_>>();
        permutation.shuffle(&mut rng);
        let train = permutation.split_off(test_len);
        (permutation, train)
    };

    let features = dataset.features();
    let labels = dataset.labels();
    Ok(Partition {
        train_features: features.select_rows(&train_rows),
        train_labels: labels.select_rows(&train_rows),
        test_features: features.select_rows(&test_rows),
        test_labels: labels.select_rows(&test_rows),
        train_rows,
        test_rows,
    })
}

/// Per-class shuffle; class test quotas follow class proportions, rounded by
/// largest remainder so they sum to `test_len`.
fn stratified_rows(
    labels: &LabelTable,
    test_len: usize,
    rng: &mut StdRng,
) -> (Vec<usize>, Vec<usize>) {
    let n = labels.len();
    let mut by_class = vec![Vec::new(); CLASSES];
    for (i, label) in labels.iter().enumerate() {
        by_class[label.index()].push(i);
    }

    let exact = by_class
        .iter()
        .map(|rows| rows.len() as f64 * test_len as f64 / n as f64)
        .collect::<Vec<_>>();
    let mut quotas = exact.iter().map(|q| q.floor() as usize).collect::<Vec<_>>();
    let missing = test_len - quotas.iter().sum::<usize>();
    for class in (0..CLASSES)
        .sorted_by(|&a, &b| {
            let ra = exact[a] - exact[a].floor();
            let rb = exact[b] - exact[b].floor();
            rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal)
        })
        .take(missing)
    {
        quotas[class] += 1;
    }

    let mut test = Vec::with_capacity(test_len);
    let mut train = Vec::with_capacity(n - test_len);
    for (rows, quota) in by_class.iter_mut().zip(quotas) {
        rows.shuffle(rng);
        let quota = quota.min(rows.len());
        test.extend_from_slice(&rows[..quota]);
        train.extend_from_slice(&rows[quota..]);
    }
    test.shuffle(rng);
    train.shuffle(rng);
    (test, train)
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PreprocessError {
    #[error("invalid split: {0}")]
    InvalidSplit(String),

    #[error("feature {column:?} has zero variance in the training rows")]
    DegenerateFeature { column: String },

    #[error("scaling was fitted on {expected} columns, got {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Table(#[from] TableError),
}
