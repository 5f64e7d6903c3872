use crate::classifier::{check_features, check_training_set, ClassWeight, Classifier, FitError};
use crate::dataset::{FeatureTable, LabelTable};
use crate::decision_tree::{to_label, Tree, TreeGrowth};
use crate::table::{Table, CLASSES};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::num::NonZeroUsize;

#[derive(Debug, Clone)]
pub struct RandomForestOptions {
    pub trees: NonZeroUsize,
    pub max_features: Option<usize>,
    pub class_weight: ClassWeight,
    pub seed: Option<u64>,
}

impl RandomForestOptions {
    pub fn trees(mut self, trees: NonZeroUsize) -> Self {
        self.trees = trees;
        self
    }

    pub fn class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Default for RandomForestOptions {
    fn default() -> Self {
        Self {
            trees: NonZeroUsize::new(100).expect("never fails"),
            max_features: None,
            class_weight: ClassWeight::Uniform,
            seed: None,
        }
    }
}

impl RandomForestOptions {
    fn tree_rngs(&self) -> impl Iterator<Item = StdRng> {
        let seed_u64 = self.seed.unwrap_or_else(|| rand::thread_rng().gen());
        let mut seed = [0u8; 32];
        seed[0..8].copy_from_slice(&seed_u64.to_be_bytes()[..]);
        let mut rng = StdRng::from_seed(seed);
        (0..self.trees.get()).map(move |_| {
            let mut seed = [0u8; 32];
            rng.fill(&mut seed);
            StdRng::from_seed(seed)
        })
    }

    fn decide_max_features(&self, features_len: usize) -> usize {
        self.max_features
            .unwrap_or_else(|| (features_len as f64).sqrt().floor() as usize)
            .max(1)
    }
}

/// Bagged ensemble of Gini trees; predicts the class with the highest mean
/// probability across trees.
#[derive(Debug)]
pub struct RandomForestClassifier {
    options: RandomForestOptions,
    fitted: Option<(Vec<Tree>, usize)>,
}

impl RandomForestClassifier {
    pub fn new(options: RandomForestOptions) -> Self {
        Self {
            options,
            fitted: None,
        }
    }

    pub fn predict_proba(&self, features: &FeatureTable) -> Result<Vec<[f64; CLASSES]>, FitError> {
        let (forest, features_len) = self.fitted.as_ref().ok_or(FitError::NotFitted)?;
        check_features(features, *features_len)?;
        Ok(features
            .rows()
            .map(|xs| {
                let mut total = [0.0; CLASSES];
                for tree in forest {
                    for (t, p) in total.iter_mut().zip(tree.predict_proba(&xs).iter()) {
                        *t += p;
                    }
                }
                total.map(|t| t / forest.len() as f64)
            })
            .collect())
    }

    pub fn trees(&self) -> Option<&[Tree]> {
        self.fitted.as_ref().map(|(forest, _)| forest.as_slice())
    }

    fn tree_fit<R: Rng + ?Sized>(rng: &mut R, table: &Table, max_features: usize) -> Tree {
        let table = table.bootstrap_sample(rng);
        let growth = TreeGrowth {
            max_features: Some(max_features),
            max_depth: None,
            min_samples_split: 2,
        };
        Tree::fit(rng, table, growth)
    }
}

impl Classifier for RandomForestClassifier {
    fn name(&self) -> &str {
        "Random Forest"
    }

    fn fit(&mut self, features: &FeatureTable, labels: &LabelTable) -> Result<(), FitError> {
        let target = check_training_set(features, labels)?;
        // Class weights come from the full training labels, not each bootstrap.
        let weights = self.options.class_weight.sample_weights(labels);
        let table = Table::new(
            features.columns().iter().map(Vec::as_slice).collect(),
            &target,
            &weights,
        )?;

        let max_features = self.options.decide_max_features(table.features_len());
        let forest = self
            .options
            .tree_rngs()
            .map(|mut rng| Self::tree_fit(&mut rng, &table, max_features))
            .collect::<Vec<_>>();
        self.fitted = Some((forest, features.features_len()));
        Ok(())
    }

    fn predict(&self, features: &FeatureTable) -> Result<LabelTable, FitError> {
        Ok(self
            .predict_proba(features)?
            .iter()
            .map(to_label)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::AgeGroup::{NonSenior, Senior};

    fn separable() -> Result<(FeatureTable, LabelTable), anyhow::Error> {
        let rows = (0..40)
            .map(|i| vec![i as f64, ((i * 7) % 5) as f64])
            .collect::<Vec<_>>();
        let features = FeatureTable::from_rows(vec!["a".to_owned(), "b".to_owned()], &rows)?;
        let labels = (0..40)
            .map(|i| if i < 30 { NonSenior } else { Senior })
            .collect();
        Ok((features, labels))
    }

    #[test]
    fn classification_works() -> Result<(), anyhow::Error> {
        let (features, labels) = separable()?;
        let options = RandomForestOptions::default()
            .trees(NonZeroUsize::new(20).expect("never fails"))
            .class_weight(ClassWeight::Balanced)
            .seed(0);
        let mut forest = RandomForestClassifier::new(options);
        forest.fit(&features, &labels)?;
        assert_eq!(forest.trees().map(|t| t.len()), Some(20));

        let test = FeatureTable::from_rows(
            vec!["a".to_owned(), "b".to_owned()],
            &[vec![2.0, 1.0], vec![38.0, 3.0]],
        )?;
        assert_eq!(forest.predict(&test)?.labels(), &[NonSenior, Senior]);

        let proba = forest.predict_proba(&test)?;
        for p in proba {
            assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
        Ok(())
    }

    #[test]
    fn seeded_fit_is_deterministic() -> Result<(), anyhow::Error> {
        let (features, labels) = separable()?;
        let fit = || -> Result<Vec<[f64; CLASSES]>, anyhow::Error> {
            let options = RandomForestOptions::default()
                .trees(NonZeroUsize::new(10).expect("never fails"))
                .seed(42);
            let mut forest = RandomForestClassifier::new(options);
            forest.fit(&features, &labels)?;
            Ok(forest.predict_proba(&features)?)
        };
        assert_eq!(fit()?, fit()?);
        Ok(())
    }

    #[test]
    fn max_features_defaults_to_sqrt() {
        let options = RandomForestOptions::default();
        assert_eq!(options.decide_max_features(7), 2);
        assert_eq!(options.decide_max_features(1), 1);
        assert_eq!(options.decide_max_features(16), 4);
    }
}
