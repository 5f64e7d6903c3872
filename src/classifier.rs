//! The common fit/predict surface shared by every model in the bank.
use crate::dataset::{FeatureTable, LabelTable};
use crate::table::{TreeTableError, CLASSES};
use thiserror::Error;

pub trait Classifier: std::fmt::Debug {
    fn name(&self) -> &str;

    fn fit(&mut self, features: &FeatureTable, labels: &LabelTable) -> Result<(), FitError>;

    fn predict(&self, features: &FeatureTable) -> Result<LabelTable, FitError>;
}

/// Per-class sample weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassWeight {
    Uniform,
    /// `n_samples / (n_classes * class_count)`, so every class carries the
    /// same total weight.
    Balanced,
}

impl ClassWeight {
    pub fn class_weights(self, labels: &LabelTable) -> [f64; CLASSES] {
        match self {
            ClassWeight::Uniform => [1.0; CLASSES],
            ClassWeight::Balanced => {
                let counts = labels.class_counts();
                let present = counts.iter().filter(|&&c| c > 0).count().max(1);
                let n = labels.len() as f64;
                let mut weights = [0.0; CLASSES];
                for (w, &c) in weights.iter_mut().zip(counts.iter()) {
                    if c > 0 {
                        *w = n / (present as f64 * c as f64);
                    }
                }
                weights
            }
        }
    }

    pub fn sample_weights(self, labels: &LabelTable) -> Vec<f64> {
        let weights = self.class_weights(labels);
        labels.iter().map(|l| weights[l.index()]).collect()
    }
}

impl Default for ClassWeight {
    fn default() -> Self {
        ClassWeight::Uniform
    }
}

/// Validates a training set and returns its class indices.
pub(crate) fn check_training_set(
    features: &FeatureTable,
    labels: &LabelTable,
) -> Result<Vec<usize>, FitError> {
    if labels.is_empty() {
        return Err(FitError::EmptyTrainingSet);
    }
    if features.rows_len() != labels.len() {
        return Err(FitError::RowSizeMismatch {
            features: features.rows_len(),
            labels: labels.len(),
        });
    }
    if features.has_non_finite() {
        return Err(FitError::NonFiniteFeature);
    }
    Ok(labels.class_indices())
}

pub(crate) fn check_features(features: &FeatureTable, fitted: usize) -> Result<(), FitError> {
    if features.features_len() != fitted {
        return Err(FitError::FeatureCountMismatch {
            expected: fitted,
            actual: features.features_len(),
        });
    }
    Ok(())
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("feature table has {features} rows but label table has {labels}")]
    RowSizeMismatch { features: usize, labels: usize },

    #[error("features contain non finite numbers")]
    NonFiniteFeature,

    #[error("training labels contain a single class")]
    SingleClass,

    #[error("model was fitted with {expected} features, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("model has not been fitted")]
    NotFitted,

    #[error("invalid hyperparameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Table(#[from] TreeTableError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::AgeGroup;

    #[test]
    fn balanced_weights_equalize_classes() {
        let labels = LabelTable::new(vec![
            AgeGroup::NonSenior,
            AgeGroup::NonSenior,
            AgeGroup::NonSenior,
            AgeGroup::Senior,
        ]);
        assert_eq!(ClassWeight::Balanced.class_weights(&labels), [4.0 / 6.0, 2.0]);
        assert_eq!(ClassWeight::Uniform.class_weights(&labels), [1.0, 1.0]);

        let weights = ClassWeight::Balanced.sample_weights(&labels);
        let senior = weights[3];
        let non_senior = weights[..3].iter().sum::<f64>();
        assert!((senior - non_senior).abs() < 1e-12);
    }

    #[test]
    fn checks_training_set() -> Result<(), anyhow::Error> {
        let features = FeatureTable::new(vec!["x".to_owned()], vec![vec![1.0, f64::NAN]])?;
        let labels = LabelTable::new(vec![AgeGroup::Senior, AgeGroup::NonSenior]);
        assert_eq!(
            check_training_set(&features, &labels),
            Err(FitError::NonFiniteFeature)
        );
        assert_eq!(
            check_training_set(&features, &LabelTable::new(vec![AgeGroup::Senior])),
            Err(FitError::RowSizeMismatch {
                features: 2,
                labels: 1
            })
        );
        assert_eq!(
            check_features(&features, 3).err(),
            Some(FitError::FeatureCountMismatch {
                expected: 3,
                actual: 1
            })
        );
        Ok(())
    }
}
