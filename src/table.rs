use ordered_float::OrderedFloat;
use rand::Rng;
use std::ops::Range;
use thiserror::Error;

/// Number of target classes.
pub const CLASSES: usize = 2;

/// Row-index view over borrowed feature columns and class targets, used while
/// growing trees.
#[derive(Debug, Clone)]
pub struct Table<'a> {
    row_index: Vec<usize>,
    row_range: Range<usize>,
    features: Vec<&'a [f64]>,
    target: &'a [usize],
    weights: &'a [f64],
}

impl<'a> Table<'a> {
    pub fn new(
        features: Vec<&'a [f64]>,
        target: &'a [usize],
        weights: &'a [f64],
    ) -> Result<Self, TreeTableError> {
        if features.is_empty() || target.is_empty() {
            return Err(TreeTableError::EmptyTable);
        }

        let rows_len = target.len();
        if features.iter().any(|c| c.len() != rows_len) || weights.len() != rows_len {
            return Err(TreeTableError::RowSizeMismatch);
        }

        if features.iter().any(|c| c.iter().any(|x| !x.is_finite())) {
            return Err(TreeTableError::NonFiniteFeature);
        }

        if target.iter().any(|&t| t >= CLASSES) {
            return Err(TreeTableError::UnknownClass);
        }

        Ok(Self {
            row_index: (0..rows_len).collect(),
            row_range: Range {
                start: 0,
                end: rows_len,
            },
            features,
            target,
            weights,
        })
    }

    pub fn target(&self) -> impl '_ + Iterator<Item = usize> + Clone {
        self.rows().map(move |i| self.target[i])
    }

    pub fn feature(&self, column_index: usize) -> impl '_ + Iterator<Item = f64> + Clone {
        self.rows().map(move |i| self.features[column_index][i])
    }

    /// Weighted class totals of the current rows.
    pub fn class_weights(&self) -> [f64; CLASSES] {
        let mut totals = [0.0; CLASSES];
        for i in self.rows() {
            totals[self.target[i]] += self.weights[i];
        }
        totals
    }

    /// Running weighted class totals, one entry per current row in order.
    pub fn cumulative_class_weights(&self) -> Vec<[f64; CLASSES]> {
        let mut acc = [0.0; CLASSES];
        self.rows()
            .map(|i| {
                acc[self.target[i]] += self.weights[i];
                acc
            })
            .collect()
    }

    pub fn features_len(&self) -> usize {
        self.features.len()
    }

    pub fn rows_len(&self) -> usize {
        self.row_range.end - self.row_range.start
    }

    pub fn is_single_target(&self) -> bool {
        let mut target = self.target();
        let first = target.next();
        target.all(|t| Some(t) == first)
    }

    fn rows(&self) -> impl '_ + Iterator<Item = usize> + Clone {
        self.row_index[self.row_range.start..self.row_range.end]
            .iter()
            .copied()
    }

    pub fn sort_rows_by_feature(&mut self, column: usize) {
        let features = &self.features;
        self.row_index[self.row_range.start..self.row_range.end]
            .sort_by_key(|&x| (OrderedFloat(features[column][x]), x))
    }

    pub fn bootstrap_sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let row_index = (0..self.rows_len())
            .map(|_| self.row_index[rng.gen_range(self.row_range.start..self.row_range.end)])
            .collect::<Vec<_>>();
        let row_range = Range {
            start: 0,
            end: self.rows_len(),
        };
        Self {
            row_index,
            row_range,
            features: self.features.clone(),
            target: self.target,
            weights: self.weights,
        }
    }

    /// Candidate split points as `(row, threshold)` where `row` is the count
    /// of rows falling on the left side.
    pub fn thresholds(&self, column: usize) -> impl '_ + Iterator<Item = (usize, f64)> {
        // Assumption: rows have been sorted by `column`.
        let column = self.features[column];
        self.rows()
            .map(move |i| column[i])
            .enumerate()
            .scan(None, |prev, (i, x)| {
                if prev.is_none() {
                    *prev = Some(x);
                    Some(None)
                } else if *prev != Some(x) {
                    let y = prev.expect("never fails");
                    *prev = Some(x);
                    let mid = y + (x - y) / 2.0;
                    // Adjacent floats: the midpoint can round up to `x`.
                    Some(Some((i, if mid < x { mid } else { y })))
                } else {
                    Some(None)
                }
            })
            .flatten()
    }

    pub fn with_split<F, T>(&mut self, row: usize, mut f: F) -> (T, T)
    where
        F: FnMut(&mut Self) -> T,
    {
        let row = row + self.row_range.start;
        let original = self.row_range.clone();

        self.row_range.end = row;
        let left = f(self);
        self.row_range.end = original.end;

        self.row_range.start = row;
        let right = f(self);
        self.row_range.start = original.start;

        (left, right)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeTableError {
    #[error("table must have at least one feature and one row")]
    EmptyTable,

    #[error("some of features, target or weights have a different row count from others")]
    RowSizeMismatch,

    #[error("features contain non finite numbers")]
    NonFiniteFeature,

    #[error("target contains an unknown class index")]
    UnknownClass,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn thresholds_and_split_work() -> Result<(), anyhow::Error> {
        let feature = [3.0, 1.0, 2.0, 1.0];
        let target = [1, 0, 1, 0];
        let weights = [1.0, 1.0, 2.0, 1.0];
        let mut table = Table::new(vec![&feature[..]], &target, &weights)?;
        assert_eq!(table.class_weights(), [2.0, 3.0]);

        table.sort_rows_by_feature(0);
        assert_eq!(table.feature(0).collect::<Vec<_>>(), vec![1.0, 1.0, 2.0, 3.0]);
        assert_eq!(
            table.thresholds(0).collect::<Vec<_>>(),
            vec![(2, 1.5), (3, 2.5)]
        );
        assert_eq!(
            table.cumulative_class_weights(),
            vec![[1.0, 0.0], [2.0, 0.0], [2.0, 2.0], [2.0, 3.0]]
        );

        let (left, right) = table.with_split(2, |t| (t.rows_len(), t.is_single_target()));
        assert_eq!(left, (2, true));
        assert_eq!(right, (2, true));
        assert_eq!(table.rows_len(), 4);
        assert!(!table.is_single_target());
        Ok(())
    }

    #[test]
    fn bootstrap_keeps_size() -> Result<(), anyhow::Error> {
        let feature = [0.0, 1.0, 2.0, 3.0, 4.0];
        let target = [0, 0, 1, 1, 1];
        let weights = [1.0; 5];
        let table = Table::new(vec![&feature[..]], &target, &weights)?;
        let sample = table.bootstrap_sample(&mut StdRng::seed_from_u64(0));
        assert_eq!(sample.rows_len(), 5);
        assert!(sample.feature(0).all(|x| feature.contains(&x)));
        Ok(())
    }

    #[test]
    fn rejects_invalid_input() {
        let feature = [0.0, f64::NAN];
        let target = [0, 1];
        let weights = [1.0, 1.0];
        assert_eq!(
            Table::new(vec![&feature[..]], &target, &weights).err(),
            Some(TreeTableError::NonFiniteFeature)
        );
        assert_eq!(
            Table::new(vec![&feature[..1]], &target, &weights).err(),
            Some(TreeTableError::RowSizeMismatch)
        );
        assert_eq!(
            Table::new(vec![&[0.0, 1.0][..]], &[0, 2], &weights).err(),
            Some(TreeTableError::UnknownClass)
        );
    }
}
