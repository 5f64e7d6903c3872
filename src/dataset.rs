//! In-memory feature and label tables.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The fixed feature schema, in column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    Gender,
    PhysicalActivity,
    BodyMassIndex,
    Glucose,
    Diabetes,
    GlucoseTolerance,
    Insulin,
}

impl Feature {
    pub const ALL: [Feature; 7] = [
        Feature::Gender,
        Feature::PhysicalActivity,
        Feature::BodyMassIndex,
        Feature::Glucose,
        Feature::Diabetes,
        Feature::GlucoseTolerance,
        Feature::Insulin,
    ];

    /// Canonical NHANES variable name.
    pub const fn code(self) -> &'static str {
        match self {
            Feature::Gender => "RIAGENDR",
            Feature::PhysicalActivity => "PAQ605",
            Feature::BodyMassIndex => "BMXBMI",
            Feature::Glucose => "LBXGLU",
            Feature::Diabetes => "DIQ010",
            Feature::GlucoseTolerance => "LBXGLT",
            Feature::Insulin => "LBXIN",
        }
    }

    /// Header names accepted for this column when reading a file.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            // Either the oral glucose tolerance test or glycohemoglobin.
            Feature::GlucoseTolerance => &["LBXGLT", "LBXGH"],
            Feature::Gender => &["RIAGENDR"],
            Feature::PhysicalActivity => &["PAQ605"],
            Feature::BodyMassIndex => &["BMXBMI"],
            Feature::Glucose => &["LBXGLU"],
            Feature::Diabetes => &["DIQ010"],
            Feature::Insulin => &["LBXIN"],
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Feature::Gender => "Gender",
            Feature::PhysicalActivity => "Physical Activity",
            Feature::BodyMassIndex => "BMI",
            Feature::Glucose => "Blood Glucose",
            Feature::Diabetes => "Diabetes Diagnosis",
            Feature::GlucoseTolerance => "Glucose Tolerance",
            Feature::Insulin => "Blood Insulin",
        }
    }

    pub const fn is_categorical(self) -> bool {
        matches!(
            self,
            Feature::Gender | Feature::PhysicalActivity | Feature::Diabetes
        )
    }

    pub fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|&f| f == self)
            .expect("never fails")
    }
}

/// Target label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgeGroup {
    NonSenior,
    Senior,
}

impl AgeGroup {
    /// Classes in index order.
    pub const ALL: [AgeGroup; 2] = [AgeGroup::NonSenior, AgeGroup::Senior];

    /// Age strictly above this is `Senior`.
    pub const SENIOR_AGE_THRESHOLD: f64 = 65.0;

    pub fn from_age(age: f64) -> Self {
        if age > Self::SENIOR_AGE_THRESHOLD {
            AgeGroup::Senior
        } else {
            AgeGroup::NonSenior
        }
    }

    pub const fn index(self) -> usize {
        match self {
            AgeGroup::NonSenior => 0,
            AgeGroup::Senior => 1,
        }
    }

    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            AgeGroup::NonSenior => "non-senior",
            AgeGroup::Senior => "senior",
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for AgeGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "senior" => Ok(AgeGroup::Senior),
            "non-senior" | "nonsenior" | "non_senior" | "adult" => Ok(AgeGroup::NonSenior),
            _ => Err(s.to_owned()),
        }
    }
}

/// Column-major feature table with the fixed schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl FeatureTable {
    pub fn new(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self, TableError> {
        if names.len() != columns.len() {
            return Err(TableError::ColumnCountMismatch {
                expected: names.len(),
                actual: columns.len(),
            });
        }
        if columns.is_empty() {
            return Err(TableError::EmptyTable);
        }

        let rows_len = columns[0].len();
        if columns.iter().skip(1).any(|c| c.len() != rows_len) {
            return Err(TableError::RowSizeMismatch);
        }
        Ok(Self { names, columns })
    }

    /// Builds a table from row-major data.
    pub fn from_rows(names: Vec<String>, rows: &[Vec<f64>]) -> Result<Self, TableError> {
        let mut columns = vec![Vec::with_capacity(rows.len()); names.len()];
        for row in rows {
            if row.len() != names.len() {
                return Err(TableError::ColumnCountMismatch {
                    expected: names.len(),
                    actual: row.len(),
                });
            }
            for (column, &x) in columns.iter_mut().zip(row.iter()) {
                column.push(x);
            }
        }
        Self::new(names, columns)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> &[f64] {
        &self.columns[index]
    }

    pub fn column_by_name(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .map(|i| self.column(i))
    }

    pub fn features_len(&self) -> usize {
        self.columns.len()
    }

    pub fn rows_len(&self) -> usize {
        self.columns[0].len()
    }

    pub fn row(&self, index: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[index]).collect()
    }

    pub fn rows(&self) -> impl '_ + Iterator<Item = Vec<f64>> {
        (0..self.rows_len()).map(move |i| self.row(i))
    }

    /// Copies the given rows, in the given order, into a new table.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|c| rows.iter().map(|&i| c[i]).collect())
            .collect();
        Self {
            names: self.names.clone(),
            columns,
        }
    }

    /// Same names, new values.
    pub fn with_columns(&self, columns: Vec<Vec<f64>>) -> Result<Self, TableError> {
        Self::new(self.names.clone(), columns)
    }

    pub fn has_non_finite(&self) -> bool {
        self.columns.iter().flatten().any(|x| !x.is_finite())
    }
}

/// Labels aligned row-for-row with a [`FeatureTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelTable {
    labels: Vec<AgeGroup>,
}

impl LabelTable {
    pub fn new(labels: Vec<AgeGroup>) -> Self {
        Self { labels }
    }

    pub fn labels(&self) -> &[AgeGroup] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl '_ + Iterator<Item = AgeGroup> + Clone {
        self.labels.iter().copied()
    }

    pub fn class_indices(&self) -> Vec<usize> {
        self.iter().map(AgeGroup::index).collect()
    }

    pub fn class_counts(&self) -> [usize; 2] {
        let mut counts = [0; 2];
        for label in self.iter() {
            counts[label.index()] += 1;
        }
        counts
    }

    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self::new(rows.iter().map(|&i| self.labels[i]).collect())
    }
}

impl FromIterator<AgeGroup> for LabelTable {
    fn from_iter<T: IntoIterator<Item = AgeGroup>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Features and labels of the same length.
#[derive(Debug, Clone)]
pub struct Dataset {
    features: FeatureTable,
    labels: LabelTable,
}

impl Dataset {
    pub fn new(features: FeatureTable, labels: LabelTable) -> Result<Self, TableError> {
        if features.rows_len() != labels.len() {
            return Err(TableError::LabelSizeMismatch {
                features: features.rows_len(),
                labels: labels.len(),
            });
        }
        Ok(Self { features, labels })
    }

    pub fn features(&self) -> &FeatureTable {
        &self.features
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn rows_len(&self) -> usize {
        self.labels.len()
    }
}

pub fn schema_names() -> Vec<String> {
    Feature::ALL.iter().map(|f| f.code().to_owned()).collect()
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TableError {
    #[error("table must have at least one column")]
    EmptyTable,

    #[error("some of columns have a different row count from others")]
    RowSizeMismatch,

    #[error("expected {expected} columns, got {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("feature table has {features} rows but label table has {labels}")]
    LabelSizeMismatch { features: usize, labels: usize },
}
