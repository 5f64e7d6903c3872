use crate::classifier::{check_features, check_training_set, Classifier, FitError};
use crate::dataset::{AgeGroup, FeatureTable, LabelTable};
use crate::functions;
use crate::table::CLASSES;

/// Portion of the largest feature variance added to every class variance.
const VAR_SMOOTHING: f64 = 1e-9;

#[derive(Debug, Clone)]
struct ClassStats {
    log_prior: f64,
    means: Vec<f64>,
    variances: Vec<f64>,
}

/// Gaussian naive Bayes with empirical class priors.
#[derive(Debug, Default)]
pub struct GaussianNaiveBayes {
    classes: Option<Vec<Option<ClassStats>>>,
}

impl GaussianNaiveBayes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Joint log likelihood per class; `-inf` for classes absent in training.
    fn joint_log_likelihood(&self, xs: &[f64]) -> Result<[f64; CLASSES], FitError> {
        let classes = self.classes.as_ref().ok_or(FitError::NotFitted)?;
        let mut jll = [f64::NEG_INFINITY; CLASSES];
        for (j, stats) in jll.iter_mut().zip(classes.iter()) {
            if let Some(stats) = stats {
                let log_likelihood = xs
                    .iter()
                    .zip(stats.means.iter().zip(stats.variances.iter()))
                    .map(|(x, (m, v))| {
                        -0.5 * (2.0 * std::f64::consts::PI * v).ln() - 0.5 * (x - m).powi(2) / v
                    })
                    .sum::<f64>();
                *j = stats.log_prior + log_likelihood;
            }
        }
        Ok(jll)
    }

    /// Posterior class probabilities.
    pub fn predict_proba(&self, features: &FeatureTable) -> Result<Vec<[f64; CLASSES]>, FitError> {
        self.check(features)?;
        features
            .rows()
            .map(|xs| {
                let jll = self.joint_log_likelihood(&xs)?;
                let max = jll.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let exp = jll.map(|l| (l - max).exp());
                let total = exp.iter().sum::<f64>();
                Ok(exp.map(|e| e / total))
            })
            .collect()
    }

    fn check(&self, features: &FeatureTable) -> Result<(), FitError> {
        let classes = self.classes.as_ref().ok_or(FitError::NotFitted)?;
        let features_len = classes
            .iter()
            .flatten()
            .map(|c| c.means.len())
            .next()
            .ok_or(FitError::NotFitted)?;
        check_features(features, features_len)
    }
}

impl Classifier for GaussianNaiveBayes {
    fn name(&self) -> &str {
        "Naive Bayes Classifier"
    }

    fn fit(&mut self, features: &FeatureTable, labels: &LabelTable) -> Result<(), FitError> {
        let target = check_training_set(features, labels)?;
        let epsilon = VAR_SMOOTHING
            * features
                .columns()
                .iter()
                .map(|c| functions::variance(c.iter().copied()))
                .fold(0.0, f64::max);

        let n = target.len() as f64;
        let classes = (0..CLASSES)
            .map(|class| {
                let rows = target
                    .iter()
                    .enumerate()
                    .filter(|(_, &t)| t == class)
                    .map(|(i, _)| i)
                    .collect::<Vec<_>>();
                if rows.is_empty() {
                    return None;
                }
                let (means, variances): (Vec<f64>, Vec<f64>) = features
                    .columns()
                    .iter()
                    .map(|c| {
                        let (m, s) = functions::mean_and_stddev(rows.iter().map(|&i| c[i]));
                        (m, s * s + epsilon)
                    })
                    .unzip();
                Some(ClassStats {
                    log_prior: (rows.len() as f64 / n).ln(),
                    means,
                    variances,
                })
            })
            .collect::<Vec<_>>();

        // Every variance is zero only when all rows are identical.
        if epsilon == 0.0 {
            return Err(FitError::InvalidParameter(
                "all feature variances are zero".to_owned(),
            ));
        }
        self.classes = Some(classes);
        Ok(())
    }

    fn predict(&self, features: &FeatureTable) -> Result<LabelTable, FitError> {
        Ok(self
            .predict_proba(features)?
            .iter()
            .map(|p| AgeGroup::from_index(functions::argmax(p)).expect("never fails"))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::AgeGroup::{NonSenior, Senior};

    #[test]
    fn gaussian_classes_are_separated() -> Result<(), anyhow::Error> {
        let features = FeatureTable::new(
            vec!["x".to_owned()],
            vec![vec![-1.2, -1.0, -0.8, 0.8, 1.0, 1.2, 1.1]],
        )?;
        let labels = LabelTable::new(vec![
            NonSenior, NonSenior, NonSenior, Senior, Senior, Senior, Senior,
        ]);
        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&features, &labels)?;

        let test = FeatureTable::new(vec!["x".to_owned()], vec![vec![-0.9, 0.9, 0.0]])?;
        let predicted = nb.predict(&test)?;
        assert_eq!(predicted.labels()[..2], [NonSenior, Senior]);

        for p in nb.predict_proba(&test)? {
            assert!((p[0] + p[1] - 1.0).abs() < 1e-12);
        }
        Ok(())
    }

    #[test]
    fn missing_class_never_wins() -> Result<(), anyhow::Error> {
        let features = FeatureTable::new(vec!["x".to_owned()], vec![vec![1.0, 2.0, 3.0]])?;
        let labels = LabelTable::new(vec![Senior; 3]);
        let mut nb = GaussianNaiveBayes::new();
        nb.fit(&features, &labels)?;
        assert_eq!(nb.predict(&features)?.labels(), &[Senior; 3]);
        Ok(())
    }

    #[test]
    fn constant_input_is_rejected() -> Result<(), anyhow::Error> {
        let features = FeatureTable::new(vec!["x".to_owned()], vec![vec![1.0; 3]])?;
        let labels = LabelTable::new(vec![Senior, NonSenior, Senior]);
        assert!(matches!(
            GaussianNaiveBayes::new().fit(&features, &labels),
            Err(FitError::InvalidParameter(_))
        ));
        Ok(())
    }
}
