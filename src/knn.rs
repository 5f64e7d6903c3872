use crate::classifier::{check_features, check_training_set, Classifier, FitError};
use crate::dataset::{AgeGroup, FeatureTable, LabelTable};
use crate::functions;
use crate::table::CLASSES;
use ordered_float::OrderedFloat;

/// Majority vote among the `k` nearest training rows (Euclidean distance).
///
/// Equal distances are ordered by training row index; equal votes go to the
/// lower class index.
#[derive(Debug)]
pub struct KNearestNeighbors {
    k: usize,
    training: Option<(Vec<Vec<f64>>, Vec<usize>)>,
}

impl KNearestNeighbors {
    pub fn new(k: usize) -> Self {
        Self { k, training: None }
    }

    /// Fraction of neighbor votes per class.
    pub fn predict_proba(&self, features: &FeatureTable) -> Result<Vec<[f64; CLASSES]>, FitError> {
        let (rows, target) = self.training.as_ref().ok_or(FitError::NotFitted)?;
        check_features(features, rows[0].len())?;

        let k = self.k.min(rows.len());
        Ok(features
            .rows()
            .map(|xs| {
                let mut distances = rows
                    .iter()
                    .enumerate()
                    .map(|(i, row)| (OrderedFloat(functions::squared_distance(&xs, row)), i))
                    .collect::<Vec<_>>();
                if k < distances.len() {
                    distances.select_nth_unstable(k - 1);
                }

                let mut votes = [0.0; CLASSES];
                for &(_, i) in &distances[..k] {
                    votes[target[i]] += 1.0;
                }
                votes.map(|v| v / k as f64)
            })
            .collect())
    }
}

impl Classifier for KNearestNeighbors {
    fn name(&self) -> &str {
        "K-Nearest Neighbours"
    }

    fn fit(&mut self, features: &FeatureTable, labels: &LabelTable) -> Result<(), FitError> {
        if self.k == 0 {
            return Err(FitError::InvalidParameter("k must be positive".to_owned()));
        }
        let target = check_training_set(features, labels)?;
        self.training = Some((features.rows().collect(), target));
        Ok(())
    }

    fn predict(&self, features: &FeatureTable) -> Result<LabelTable, FitError> {
        Ok(self
            .predict_proba(features)?
            .iter()
            .map(|votes| AgeGroup::from_index(functions::argmax(votes)).expect("never fails"))
            .collect())
    }
}
